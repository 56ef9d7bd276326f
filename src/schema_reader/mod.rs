//! Catalog introspection (spec.md §4.2, component C2).
//!
//! Each engine loads its catalog into the same normalized [`SchemaData`]
//! shape so [`crate::model::DbModelBuilder`] never has to know which driver
//! produced it. Readers never mutate catalog state and fail with
//! [`crate::error::EngineError::SchemaRead`] on any catalog read failure.

#[cfg(feature = "mssql")]
mod mssql;
mod mysql;
mod postgres;
mod sqlite;

#[cfg(feature = "mssql")]
pub use mssql::read_mssql;
pub use mysql::read_mysql;
pub use postgres::read_postgres;
pub use sqlite::read_sqlite;

use crate::db::Pool;
use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct RawTable {
    pub schema: String,
    pub name: String,
    pub is_view: bool,
}

#[derive(Debug, Clone)]
pub struct RawColumn {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub is_identity: bool,
    pub ordinal_position: usize,
}

#[derive(Debug, Clone)]
pub struct RawForeignKey {
    pub child_schema: String,
    pub child_table: String,
    pub child_column: String,
    pub parent_schema: String,
    pub parent_table: String,
    pub parent_column: String,
}

/// Normalized catalog snapshot, engine-agnostic.
#[derive(Debug, Clone, Default)]
pub struct SchemaData {
    pub tables: Vec<RawTable>,
    pub columns: Vec<RawColumn>,
    pub foreign_keys: Vec<RawForeignKey>,
}

/// Dispatch to the engine-specific reader behind `pool`.
pub async fn read_schema(pool: &Pool) -> Result<SchemaData, EngineError> {
    match pool {
        Pool::Sqlite(p) => read_sqlite(p).await,
        Pool::Postgres(p) => read_postgres(p).await,
        Pool::MySql(p) => read_mysql(p).await,
        #[cfg(feature = "mssql")]
        Pool::Mssql(p) => read_mssql(p).await,
    }
}
