use super::{Dialect, LikeKind, UpsertStyle};

/// PostgreSQL dialect.
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn escape_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn parameter_prefix(&self) -> &'static str {
        "$"
    }

    fn paginate(&self, sort: &[String], offset: i64, limit: Option<i64>) -> String {
        let order = if sort.is_empty() {
            String::new()
        } else {
            format!("ORDER BY {} ", sort.join(", "))
        };

        match limit {
            Some(-1) => format!("{order}OFFSET {offset}").trim_end().to_string(),
            Some(n) => format!("{order}LIMIT {n} OFFSET {offset}").trim_end().to_string(),
            None => format!("{order}LIMIT 100 OFFSET {offset}").trim_end().to_string(),
        }
    }

    fn last_inserted_identity(&self) -> &'static str {
        "lastval()"
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
