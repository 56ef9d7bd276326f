use sqlx::{Row, SqlitePool};

use super::{RawColumn, RawForeignKey, RawTable, SchemaData};
use crate::error::EngineError;

/// SQLite has no `information_schema`; introspect one table at a time via
/// `PRAGMA table_info` / `PRAGMA foreign_key_list` (spec.md §4.2).
pub async fn read_sqlite(pool: &SqlitePool) -> Result<SchemaData, EngineError> {
    let mut data = SchemaData::default();

    let table_rows = sqlx::query(
        "SELECT name, type FROM sqlite_master WHERE type IN ('table','view') \
         AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| EngineError::SchemaRead(e.into()))?;

    for row in &table_rows {
        let name: String = row.try_get("name").map_err(|e| EngineError::SchemaRead(e.into()))?;
        let kind: String = row.try_get("type").map_err(|e| EngineError::SchemaRead(e.into()))?;

        data.tables.push(RawTable {
            schema: String::new(),
            name: name.clone(),
            is_view: kind == "view",
        });

        let columns = sqlx::query(&format!("PRAGMA table_info(\"{}\")", name.replace('"', "\"\"")))
            .fetch_all(pool)
            .await
            .map_err(|e| EngineError::SchemaRead(e.into()))?;

        for col in &columns {
            let col_name: String = col.try_get("name").map_err(|e| EngineError::SchemaRead(e.into()))?;
            let data_type: String = col.try_get("type").map_err(|e| EngineError::SchemaRead(e.into()))?;
            let notnull: i64 = col.try_get("notnull").map_err(|e| EngineError::SchemaRead(e.into()))?;
            let pk: i64 = col.try_get("pk").map_err(|e| EngineError::SchemaRead(e.into()))?;
            let cid: i64 = col.try_get("cid").map_err(|e| EngineError::SchemaRead(e.into()))?;

            data.columns.push(RawColumn {
                schema: String::new(),
                table: name.clone(),
                name: col_name,
                data_type: if data_type.is_empty() { "TEXT".to_string() } else { data_type },
                is_nullable: notnull == 0,
                is_primary_key: pk > 0,
                // SQLite has no separate identity flag; an INTEGER PRIMARY KEY column
                // is always the implicit rowid alias and therefore auto-incrementing.
                is_identity: pk > 0,
                ordinal_position: cid as usize,
            });
        }

        let fks = sqlx::query(&format!("PRAGMA foreign_key_list(\"{}\")", name.replace('"', "\"\"")))
            .fetch_all(pool)
            .await
            .map_err(|e| EngineError::SchemaRead(e.into()))?;

        for fk in &fks {
            let parent_table: String = fk.try_get("table").map_err(|e| EngineError::SchemaRead(e.into()))?;
            let from_col: String = fk.try_get("from").map_err(|e| EngineError::SchemaRead(e.into()))?;
            let to_col: String = fk.try_get("to").map_err(|e| EngineError::SchemaRead(e.into()))?;

            data.foreign_keys.push(RawForeignKey {
                child_schema: String::new(),
                child_table: name.clone(),
                child_column: from_col,
                parent_schema: String::new(),
                parent_table,
                parent_column: to_col,
            });
        }
    }

    Ok(data)
}
