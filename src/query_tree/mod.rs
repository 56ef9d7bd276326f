//! The per-request query tree (spec.md §3, components C5/C6).
//!
//! `TableQuery`/`Join`/`Filter` are transient: built fresh by the visitor for
//! one request, walked once by the module pipeline, walked again by the SQL
//! compiler, then dropped. They are never shared across requests — unlike
//! [`crate::model::DbModel`], which is immutable and shared.

pub mod filter;
pub mod visitor;

pub use filter::{Filter, FilterOp, FilterValue};

/// A sort entry, already validated against `/^[a-zA-Z_]\w* (asc|desc)$/` by the visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortEntry {
    pub column: String,
    pub descending: bool,
}

impl SortEntry {
    pub fn to_sql(&self, escape: impl Fn(&str) -> String) -> String {
        format!("{} {}", escape(&self.column), if self.descending { "desc" } else { "asc" })
    }
}

/// Whether a join was produced by walking a declared [`crate::model::Link`]
/// (`resolved`) or requested explicitly via `_join_<T>`/`_single_<T>` (`dynamic`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOrigin {
    Resolved,
    Dynamic,
}

/// `single` when at most one child row can match a parent; `multi` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Single,
    Multi,
}

/// An edge in the query tree connecting a parent `TableQuery` to a child one.
#[derive(Debug, Clone)]
pub struct Join {
    /// The GraphQL field name this join was requested under (e.g. `orders`, `sess`).
    pub name: String,
    /// The alias used for the generated statement name (`<parent>-><alias|name>`).
    pub alias: Option<String>,
    pub kind: JoinKind,
    pub origin: JoinOrigin,
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    pub child: Box<TableQuery>,
}

impl Join {
    /// The name used in the statement map: `<alias|name>`.
    pub fn statement_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A navigation the visitor recorded against a declared link but has not yet
/// resolved into a concrete [`Join`] — that happens in the compiler's first
/// step (spec.md §4.6 step 1), once the DbModel is in scope.
#[derive(Debug, Clone)]
pub struct PendingLink {
    pub field_name: String,
    pub alias: Option<String>,
    pub child: Box<TableQuery>,
}

/// The root entity of a selection: a table, its projected columns, its
/// filter/sort/paging arguments, and its nested joins/links.
#[derive(Debug, Clone)]
pub struct TableQuery {
    /// The DbModel table this query targets (schema-qualified, set by the visitor
    /// from the GraphQL field/type name).
    pub table: String,
    /// Alias used for the generated statement name; `None` means use `table`.
    pub alias: Option<String>,
    pub columns: Vec<String>,
    pub filter: Option<Filter>,
    pub sort: Vec<SortEntry>,
    /// `None` means "not specified" (defaults to 100); `Some(-1)` means unbounded.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Explicit dynamic joins (`_join_<T>`/`_single_<T>`) and links already resolved
    /// into joins by the compiler's first pass.
    pub joins: Vec<Join>,
    /// Link-name navigations (e.g. `workshop { ... }`) pending resolution against
    /// the DbModel.
    pub links: Vec<PendingLink>,
    /// Requests the `{data, total}` paged envelope (`<table>_paged` root field,
    /// or `includeMeta` carried down from a parent wrapper).
    pub include_meta: bool,
    /// Fragment spreads recorded during the walk, expanded by the post-walk
    /// fragment reduction pass (spec.md §4.5).
    pub fragment_spreads: Vec<String>,
    /// Visitor scratch flag: flipped while inside a paged envelope's `data`
    /// field so subsequent selections populate the inner object, not the envelope.
    pub processing_result: bool,
}

impl TableQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            columns: Vec::new(),
            filter: None,
            sort: Vec::new(),
            limit: None,
            offset: None,
            joins: Vec::new(),
            links: Vec::new(),
            include_meta: false,
            fragment_spreads: Vec::new(),
            processing_result: false,
        }
    }

    /// Statement name for the base SELECT (`<alias|table>`).
    pub fn statement_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    pub fn effective_limit(&self) -> Option<i64> {
        self.limit
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0)
    }
}
