use sqlx::{MySqlPool, Row};

use super::{RawColumn, RawForeignKey, RawTable, SchemaData};
use crate::error::EngineError;

/// MySQL's `information_schema` is scoped by `TABLE_SCHEMA` (the database
/// name, since MySQL has no separate schema concept above a database).
pub async fn read_mysql(pool: &MySqlPool) -> Result<SchemaData, EngineError> {
    let mut data = SchemaData::default();

    let table_rows = sqlx::query(
        "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = DATABASE()",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| EngineError::SchemaRead(e.into()))?;

    for row in &table_rows {
        let schema: String = row.try_get("TABLE_SCHEMA").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let name: String = row.try_get("TABLE_NAME").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let table_type: String = row.try_get("TABLE_TYPE").map_err(|e| EngineError::SchemaRead(e.into()))?;
        data.tables.push(RawTable {
            schema,
            name,
            is_view: table_type == "VIEW",
        });
    }

    let col_rows = sqlx::query(
        "SELECT TABLE_SCHEMA, TABLE_NAME, COLUMN_NAME, DATA_TYPE, IS_NULLABLE, \
         COLUMN_KEY, EXTRA, ORDINAL_POSITION \
         FROM information_schema.COLUMNS WHERE TABLE_SCHEMA = DATABASE() \
         ORDER BY TABLE_NAME, ORDINAL_POSITION",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| EngineError::SchemaRead(e.into()))?;

    for row in &col_rows {
        let schema: String = row.try_get("TABLE_SCHEMA").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let table: String = row.try_get("TABLE_NAME").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let name: String = row.try_get("COLUMN_NAME").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let data_type: String = row.try_get("DATA_TYPE").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let is_nullable: String = row.try_get("IS_NULLABLE").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let column_key: String = row.try_get("COLUMN_KEY").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let extra: String = row.try_get("EXTRA").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let ordinal: i64 = row.try_get("ORDINAL_POSITION").map_err(|e| EngineError::SchemaRead(e.into()))?;

        data.columns.push(RawColumn {
            schema,
            table,
            name,
            data_type,
            is_nullable: is_nullable == "YES",
            is_primary_key: column_key == "PRI",
            is_identity: extra.contains("auto_increment"),
            ordinal_position: ordinal as usize,
        });
    }

    let fk_rows = sqlx::query(
        "SELECT TABLE_SCHEMA AS child_schema, TABLE_NAME AS child_table, COLUMN_NAME AS child_column, \
         REFERENCED_TABLE_SCHEMA AS parent_schema, REFERENCED_TABLE_NAME AS parent_table, \
         REFERENCED_COLUMN_NAME AS parent_column \
         FROM information_schema.KEY_COLUMN_USAGE \
         WHERE TABLE_SCHEMA = DATABASE() AND REFERENCED_TABLE_NAME IS NOT NULL",
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
