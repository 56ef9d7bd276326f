use super::{Dialect, LikeKind, UpsertStyle};

/// SQLite dialect.
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn escape_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn parameter_prefix(&self) -> &'static str {
        "?"
    }

    fn paginate(&self, sort: &[String], offset: i64, limit: Option<i64>) -> String {
        let order = if sort.is_empty() {
            String::new()
        } else {
            format!("ORDER BY {} ", sort.join(", "))
        };

        match limit {
            Some(-1) => format!("{order}LIMIT -1 OFFSET {offset}"),
            Some(n) => format!("{order}LIMIT {n} OFFSET {offset}"),
            None => format!("{order}LIMIT 100 OFFSET {offset}"),
        }
        .trim_end()
        .to_string()
    }

    fn last_inserted_identity(&self) -> &'static str {
        "last_insert_rowid()"
    }

    fn like_pattern(&self, placeholder: &str, kind: LikeKind) -> String {
        match kind {
            LikeKind::Contains => format!("'%' || {placeholder} || '%'"),
            LikeKind::StartsWith => format!("{placeholder} || '%'"),
            LikeKind::EndsWith => format!("'%' || {placeholder}"),
        }
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnConflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::LikeKind;

    #[test]
    fn escapes_embedded_quotes() {
        let d = SqliteDialect;
        assert_eq!(d.escape_identifier("weird\"name"), "\"weird\"\"name\"");
    }

    #[test]
    fn paginate_defaults_to_100() {
        let d = SqliteDialect;
        assert_eq!(d.paginate(&[], 0, None), "LIMIT 100 OFFSET 0");
    }

    #[test]
    fn paginate_unbounded_with_sort() {
        let d = SqliteDialect;
        assert_eq!(
            d.paginate(&["name asc".to_string()], 5, Some(-1)),
            "ORDER BY name asc LIMIT -1 OFFSET 5"
        );
    }

    #[test]
    fn like_patterns_use_concat_operator() {
        let d = SqliteDialect;
        assert_eq!(d.like_pattern("?1", LikeKind::Contains), "'%' || ?1 || '%'");
        assert_eq!(d.like_pattern("?1", LikeKind::StartsWith), "?1 || '%'");
    }
}
