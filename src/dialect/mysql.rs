use super::{Dialect, LikeKind, UpsertStyle};

/// MySQL / MariaDB dialect.
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn escape_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
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
            // MySQL has no unbounded LIMIT keyword; the de-facto idiom is a huge cap.
            Some(-1) => format!("{order}LIMIT 18446744073709551615 OFFSET {offset}"),
            Some(n) => format!("{order}LIMIT {n} OFFSET {offset}"),
            None => format!("{order}LIMIT 100 OFFSET {offset}"),
        }
        .trim_end()
        .to_string()
    }

    fn last_inserted_identity(&self) -> &'static str {
        "LAST_INSERT_ID()"
    }

    fn like_pattern(&self, placeholder: &str, kind: LikeKind) -> String {
        match kind {
            LikeKind::Contains => format!("CONCAT('%', {placeholder}, '%')"),
            LikeKind::StartsWith => format!("CONCAT({placeholder}, '%')"),
            LikeKind::EndsWith => format!("CONCAT('%', {placeholder})"),
        }
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnDuplicateKey
    }
}
