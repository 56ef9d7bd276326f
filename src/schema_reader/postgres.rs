use sqlx::{PgPool, Row};

use super::{RawColumn, RawForeignKey, RawTable, SchemaData};
use crate::error::EngineError;

/// PostgreSQL has a complete `information_schema`; one query per facet
/// (tables, columns, primary keys, foreign keys), issued over the same pool.
pub async fn read_postgres(pool: &PgPool) -> Result<SchemaData, EngineError> {
    let mut data = SchemaData::default();

    let table_rows = sqlx::query(
        "SELECT table_schema, table_name, table_type FROM information_schema.tables \
         WHERE table_schema NOT IN ('pg_catalog', 'information_schema')",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| EngineError::SchemaRead(e.into()))?;

    for row in &table_rows {
        let schema: String = row.try_get("table_schema").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let name: String = row.try_get("table_name").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let table_type: String = row.try_get("table_type").map_err(|e| EngineError::SchemaRead(e.into()))?;
        data.tables.push(RawTable {
            schema,
            name,
            is_view: table_type == "VIEW",
        });
    }

    let pk_rows = sqlx::query(
        "SELECT tc.table_schema, tc.table_name, kcu.column_name \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
         WHERE tc.constraint_type = 'PRIMARY KEY'",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| EngineError::SchemaRead(e.into()))?;

    let mut pk_set = std::collections::HashSet::new();
    for row in &pk_rows {
        let schema: String = row.try_get("table_schema").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let table: String = row.try_get("table_name").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let column: String = row.try_get("column_name").map_err(|e| EngineError::SchemaRead(e.into()))?;
        pk_set.insert((schema, table, column));
    }

    let col_rows = sqlx::query(
        "SELECT table_schema, table_name, column_name, data_type, is_nullable, \
         ordinal_position, column_default \
         FROM information_schema.columns \
         WHERE table_schema NOT IN ('pg_catalog', 'information_schema') \
         ORDER BY table_schema, table_name, ordinal_position",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| EngineError::SchemaRead(e.into()))?;

    for row in &col_rows {
        let schema: String = row.try_get("table_schema").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let table: String = row.try_get("table_name").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let name: String = row.try_get("column_name").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let data_type: String = row.try_get("data_type").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let is_nullable: String = row.try_get("is_nullable").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let ordinal: i32 = row.try_get("ordinal_position").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let default: Option<String> = row.try_get("column_default").map_err(|e| EngineError::SchemaRead(e.into()))?;

        let is_pk = pk_set.contains(&(schema.clone(), table.clone(), name.clone()));
        let is_identity = default.as_deref().map(|d| d.contains("nextval")).unwrap_or(false);

        data.columns.push(RawColumn {
            schema,
            table,
            name,
            data_type,
            is_nullable: is_nullable == "YES",
            is_primary_key: is_pk,
            is_identity,
            ordinal_position: ordinal as usize,
        });
    }

    let fk_rows = sqlx::query(
        "SELECT \
           kcu.table_schema AS child_schema, kcu.table_name AS child_table, kcu.column_name AS child_column, \
           ccu.table_schema AS parent_schema, ccu.table_name AS parent_table, ccu.column_name AS parent_column \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
         JOIN information_schema.constraint_column_usage ccu \
           ON tc.constraint_name = ccu.constraint_name \
         WHERE tc.constraint_type = 'FOREIGN KEY'",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| EngineError::SchemaRead(e.into()))?;

    for row in &fk_rows {
        data.foreign_keys.push(RawForeignKey {
            child_schema: row.try_get("child_schema").map_err(|e| EngineError::SchemaRead(e.into()))?,
            child_table: row.try_get("child_table").map_err(|e| EngineError::SchemaRead(e.into()))?,
            child_column: row.try_get("child_column").map_err(|e| EngineError::SchemaRead(e.into()))?,
            parent_schema: row.try_get("parent_schema").map_err(|e| EngineError::SchemaRead(e.into()))?,
            parent_table: row.try_get("parent_table").map_err(|e| EngineError::SchemaRead(e.into()))?,
            parent_column: row.try_get("parent_column").map_err(|e| EngineError::SchemaRead(e.into()))?,
        });
    }

    Ok(data)
}
