//! Name derivation rules for the catalog snapshot (spec.md §3, §4.3 step 3).

/// Rewrite non-identifier characters and disambiguate clashes by the caller
/// tracking `seen` across a build pass.
pub fn graphql_name(raw: &str, seen: &mut std::collections::HashSet<String>) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if out.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true) {
        out.insert(0, '_');
    }

    let mut candidate = out.clone();
    let mut suffix = 1;
    while seen.contains(&candidate) {
        suffix += 1;
        candidate = format!("{out}_{suffix}");
    }
    seen.insert(candidate.clone());
    candidate
}

/// A small irregular-plural table plus the standard English suffix rules,
/// enough to singularize typical table names (`workshops` -> `workshop`,
/// `categories` -> `category`, `people` -> `person`).
pub fn singularize(name: &str) -> String {
    const IRREGULAR: &[(&str, &str)] = &[
        ("people", "person"),
        ("children", "child"),
        ("men", "man"),
        ("women", "woman"),
        ("mice", "mouse"),
        ("geese", "goose"),
        ("data", "datum"),
    ];

    let lower = name.to_ascii_lowercase();
    for (plural, singular) in IRREGULAR {
        if lower == *plural {
            return singular.to_string();
        }
    }

    if let Some(stem) = lower.strip_suffix("ies") {
        if stem.len() >= 1 {
            return format!("{stem}y");
        }
    }
    if lower.ends_with("sses") || lower.ends_with("shes") || lower.ends_with("ches") || lower.ends_with("xes") {
        return lower[..lower.len() - 2].to_string();
    }
    if let Some(stem) = lower.strip_suffix('s') {
        if !stem.ends_with('s') {
            return stem.to_string();
        }
    }
    lower
}

/// Pluralize the common case, used when deriving a multi link's field name
/// from the child table's normalized (singular) name.
pub fn pluralize(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") && !lower.ends_with("oy") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else if lower.ends_with('s') || lower.ends_with("sh") || lower.ends_with("ch") || lower.ends_with('x') {
        format!("{lower}es")
    } else {
        format!("{lower}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singularizes_common_plurals() {
        assert_eq!(singularize("workshops"), "workshop");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("people"), "person");
        assert_eq!(singularize("boxes"), "box");
    }

    #[test]
    fn pluralizes_common_singulars() {
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("workshop"), "workshops");
        assert_eq!(pluralize("box"), "boxes");
    }

    #[test]
    fn graphql_name_disambiguates_clashes() {
        let mut seen = std::collections::HashSet::new();
        assert_eq!(graphql_name("my-table", &mut seen), "my_table");
        assert_eq!(graphql_name("my_table", &mut seen), "my_table_2");
    }
}
