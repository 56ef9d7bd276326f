//! Binding a statement's slice of the shared parameter vector onto a
//! driver-specific query builder (spec.md §4.8 step 2: "Bind every parameter
//! the compiler collected; never format a value into the SQL text").
//!
//! `FilterValue::List` never reaches here directly — the compiler expands
//! `_in`/`_nin`/`_between` into one placeholder per element during rendering,
//! so by execution time every parameter slot holds a scalar.

use sqlx::query::Query;
use sqlx::{Postgres, Sqlite, MySql};

use crate::query_tree::FilterValue;

pub fn bind_sqlite<'q>(
    mut q: Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    value: &'q FilterValue,
) -> Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    q = match value {
        FilterValue::String(s) => q.bind(s.as_str()),
        FilterValue::Int(i) => q.bind(*i),
        FilterValue::Float(f) => q.bind(*f),
        FilterValue::Bool(b) => q.bind(*b),
        FilterValue::Null => q.bind(Option::<String>::None),
        FilterValue::List(_) => q.bind(value.to_string()),
    };
    q
}

pub fn bind_postgres<'q>(
    mut q: Query<'q, Postgres, sqlx::postgres::PgArguments>,
    value: &'q FilterValue,
) -> Query<'q, Postgres, sqlx::postgres::PgArguments> {
    q = match value {
        FilterValue::String(s) => q.bind(s.as_str()),
        FilterValue::Int(i) => q.bind(*i),
        FilterValue::Float(f) => q.bind(*f),
        FilterValue::Bool(b) => q.bind(*b),
        FilterValue::Null => q.bind(Option::<String>::None),
        FilterValue::List(_) => q.bind(value.to_string()),
    };
    q
}

pub fn bind_mysql<'q>(
    mut q: Query<'q, MySql, sqlx::mysql::MySqlArguments>,
    value: &'q FilterValue,
) -> Query<'q, MySql, sqlx::mysql::MySqlArguments> {
    q = match value {
        FilterValue::String(s) => q.bind(s.as_str()),
        FilterValue::Int(i) => q.bind(*i),
        FilterValue::Float(f) => q.bind(*f),
        FilterValue::Bool(b) => q.bind(*b),
        FilterValue::Null => q.bind(Option::<String>::None),
        FilterValue::List(_) => q.bind(value.to_string()),
    };
    q
}

#[cfg(feature = "mssql")]
pub fn bind_mssql(query: &mut tiberius::Query, value: &FilterValue) {
    match value {
        FilterValue::String(s) => query.bind(s.clone()),
        FilterValue::Int(i) => query.bind(*i),
        FilterValue::Float(f) => query.bind(*f),
        FilterValue::Bool(b) => query.bind(*b),
        FilterValue::Null => query.bind(Option::<String>::None),
        FilterValue::List(_) => query.bind(value.to_string()),
    }
}
