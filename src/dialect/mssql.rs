use super::{Dialect, LikeKind, UpsertStyle};

/// T-SQL (SQL Server) dialect.
pub struct MssqlDialect;

impl Dialect for MssqlDialect {
    fn escape_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn parameter_prefix(&self) -> &'static str {
        "@"
    }

    fn paginate(&self, sort: &[String], offset: i64, limit: Option<i64>) -> String {
        // SQL Server's OFFSET/FETCH requires an ORDER BY; synthesize a no-op one
        // when the query has no sort (spec.md §4.6 pagination edge cases).
        let order = if sort.is_empty() {
            "ORDER BY (SELECT NULL)".to_string()
        } else {
            format!("ORDER BY {}", sort.join(", "))
        };

        match limit {
            Some(-1) => order,
            Some(n) => format!("{order} OFFSET {offset} ROWS FETCH NEXT {n} ROWS ONLY"),
            None => format!("{order} OFFSET {offset} ROWS FETCH NEXT 100 ROWS ONLY"),
        }
    }

    fn last_inserted_identity(&self) -> &'static str {
        "SCOPE_IDENTITY()"
    }

    fn like_pattern(&self, placeholder: &str, kind: LikeKind) -> String {
        match kind {
            LikeKind::Contains => format!("'%' + {placeholder} + '%'"),
            LikeKind::StartsWith => format!("{placeholder} + '%'"),
            LikeKind::EndsWith => format!("'%' + {placeholder}"),
        }
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::Merge
    }

    fn placeholders_are_global(&self) -> bool {
        true
    }
}
