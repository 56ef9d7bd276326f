//! SQL dialect abstraction (spec.md §4.1, component C1).
//!
//! A [`Dialect`] is the pure, stateless, singleton-safe contract every SQL
//! generator (the compiler, the mutation engine) depends on. It never touches
//! the network; it only renders strings. One implementation exists per
//! supported [`Engine`].

mod mssql;
mod mysql;
mod postgres;
mod sqlite;

pub use mssql::MssqlDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::query_tree::filter::FilterOp;

/// Which database engine a connection speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    Mssql,
    Postgres,
    MySql,
    Sqlite,
}

impl Engine {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mssql" | "sqlserver" | "sql-server" => Some(Engine::Mssql),
            "postgres" | "postgresql" | "pg" => Some(Engine::Postgres),
            "mysql" | "mariadb" => Some(Engine::MySql),
            "sqlite" | "sqlite3" => Some(Engine::Sqlite),
            _ => None,
        }
    }

    /// Infer the engine from a connection string's URL scheme, the way most
    /// multi-engine Rust tools (`sqlx::any`, `tiberius`-fronted pools) dispatch.
    pub fn infer_from_url(url: &str) -> Option<Self> {
        let scheme = url.split("://").next().unwrap_or(url);
        match scheme.to_ascii_lowercase().as_str() {
            "mssql" | "sqlserver" => Some(Engine::Mssql),
            "postgres" | "postgresql" => Some(Engine::Postgres),
            "mysql" => Some(Engine::MySql),
            "sqlite" => Some(Engine::Sqlite),
            _ => None,
        }
    }

    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            Engine::Mssql => &MssqlDialect,
            Engine::Postgres => &PostgresDialect,
            Engine::MySql => &MySqlDialect,
            Engine::Sqlite => &SqliteDialect,
        }
    }

    /// Whether the driver for this engine can multiplex several statements'
    /// result sets over one round trip (spec.md §4.8 step 3, §5).
    pub fn supports_batched_result_sets(self) -> bool {
        !matches!(self, Engine::Sqlite)
    }
}

/// The kind of LIKE pattern being embedded, for [`Dialect::like_pattern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeKind {
    Contains,
    StartsWith,
    EndsWith,
}

/// Pure, stateless SQL syntax adapter. See spec.md §4.1 for the full contract table.
pub trait Dialect: Send + Sync {
    /// Quote an identifier (`[x]`, `` `x` ``, `"x"`).
    fn escape_identifier(&self, name: &str) -> String;

    /// Fully-qualified table reference. Empty schema yields an unqualified name.
    fn table_ref(&self, schema: &str, name: &str) -> String {
        if schema.is_empty() {
            self.escape_identifier(name)
        } else {
            format!("{}.{}", self.escape_identifier(schema), self.escape_identifier(name))
        }
    }

    /// Parameter placeholder prefix: `@`, `$`, `?`, `:`.
    fn parameter_prefix(&self) -> &'static str;

    /// Render the placeholder for the Nth (1-based) bound parameter.
    fn parameter_placeholder(&self, index: usize) -> String {
        match self.parameter_prefix() {
            "$" => format!("${index}"),
            "@" => format!("@p{index}"),
            "?" => "?".to_string(),
            prefix => format!("{prefix}p{index}"),
        }
    }

    /// Whether this dialect's driver executes the whole statement map as one
    /// batch bound against the single globally-numbered parameter vector
    /// (true only for `tiberius`, which multiplexes several statements'
    /// result sets over one round trip — spec.md §4.8 step 3). Every other
    /// engine here runs one statement at a time over its own bound slice of
    /// that vector, so its placeholders must be numbered 1-based *within*
    /// each statement instead, or the slice won't match what the statement
    /// text references. `?`-style placeholders (MySQL, SQLite) are immune to
    /// this either way since they carry no index.
    fn placeholders_are_global(&self) -> bool {
        false
    }

    /// Pagination clause appended after FROM/WHERE/ORDER BY. `sort` is the list
    /// of already-rendered `"col dir"` fragments (possibly empty); `limit` is
    /// `None` for the default of 100 or `Some(-1)` for unbounded.
    fn paginate(&self, sort: &[String], offset: i64, limit: Option<i64>) -> String;

    /// SQL expression returning the last auto-generated identity value.
    fn last_inserted_identity(&self) -> &'static str;

    /// Embed a bound parameter placeholder into a LIKE pattern expression.
    fn like_pattern(&self, placeholder: &str, kind: LikeKind) -> String;

    /// Map a filter operator token to its SQL operator string (shared default;
    /// dialects override only where the token isn't a plain binary operator).
    fn map_operator(&self, op: FilterOp) -> &'static str {
        match op {
            FilterOp::Eq => "=",
            FilterOp::Neq => "<>",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            _ => unreachable!("non-binary operator passed to map_operator: {op:?}"),
        }
    }

    /// Statement separator used when batching several statements into one round trip.
    fn statement_terminator(&self) -> &'static str {
        ";"
    }

    /// Upsert strategy identifier, for the mutation engine's feature matrix
    /// (spec.md §9 open question: no universal MERGE outside SQL Server).
    fn upsert_style(&self) -> UpsertStyle;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStyle {
    /// SQL Server `MERGE ... WHEN MATCHED ... WHEN NOT MATCHED`.
    Merge,
    /// `INSERT ... ON CONFLICT (pk) DO UPDATE SET ...` (PostgreSQL, SQLite).
    OnConflict,
    /// `INSERT ... ON DUPLICATE KEY UPDATE ...` (MySQL).
    OnDuplicateKey,
}
