use crate::db::MssqlPool;
use crate::error::EngineError;

use super::{RawColumn, RawForeignKey, RawTable, SchemaData};

/// SQL Server exposes a complete `INFORMATION_SCHEMA`; `sys.identity_columns`
/// fills the one gap (`IS_IDENTITY` isn't part of the standard view).
pub async fn read_mssql(pool: &MssqlPool) -> Result<SchemaData, EngineError> {
    let mut client = pool.acquire().await.map_err(EngineError::SchemaRead)?;
    let mut data = SchemaData::default();

    let table_rows = client
        .simple_query(
            "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE FROM INFORMATION_SCHEMA.TABLES",
        )
        .await
        .map_err(|e| EngineError::SchemaRead(e.into()))?
        .into_first_result()
        .await
        .map_err(|e| EngineError::SchemaRead(e.into()))?;

    for row in &table_rows {
        let schema: &str = row.get("TABLE_SCHEMA").unwrap_or_default();
        let name: &str = row.get("TABLE_NAME").unwrap_or_default();
        let table_type: &str = row.get("TABLE_TYPE").unwrap_or_default();
        data.tables.push(RawTable {
            schema: schema.to_string(),
            name: name.to_string(),
            is_view: table_type.trim() == "VIEW",
        });
    }

    let identity_rows = client
        .simple_query(
            "SELECT s.name AS schema_name, t.name AS table_name, c.name AS column_name \
             FROM sys.identity_columns c \
             JOIN sys.tables t ON c.object_id = t.object_id \
             JOIN sys.schemas s ON t.schema_id = s.schema_id",
        )
        .await
        .map_err(|e| EngineError::SchemaRead(e.into()))?
        .into_first_result()
        .await
        .map_err(|e| EngineError::SchemaRead(e.into()))?;

    let mut identity_set = std::collections::HashSet::new();
    for row in &identity_rows {
        let schema: &str = row.get("schema_name").unwrap_or_default();
        let table: &str = row.get("table_name").unwrap_or_default();
        let column: &str = row.get("column_name").unwrap_or_default();
        identity_set.insert((schema.to_string(), table.to_string(), column.to_string()));
    }

    let pk_rows = client
        .simple_query(
            "SELECT tc.TABLE_SCHEMA, tc.TABLE_NAME, kcu.COLUMN_NAME \
             FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
             JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu \
               ON tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
             WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'",
        )
        .await
        .map_err(|e| EngineError::SchemaRead(e.into()))?
        .into_first_result()
        .await
        .map_err(|e| EngineError::SchemaRead(e.into()))?;

    let mut pk_set = std::collections::HashSet::new();
    for row in &pk_rows {
        let schema: &str = row.get("TABLE_SCHEMA").unwrap_or_default();
        let table: &str = row.get("TABLE_NAME").unwrap_or_default();
        let column: &str = row.get("COLUMN_NAME").unwrap_or_default();
        pk_set.insert((schema.to_string(), table.to_string(), column.to_string()));
    }

    let col_rows = client
        .simple_query(
            "SELECT TABLE_SCHEMA, TABLE_NAME, COLUMN_NAME, DATA_TYPE, IS_NULLABLE, ORDINAL_POSITION \
             FROM INFORMATION_SCHEMA.COLUMNS ORDER BY TABLE_NAME, ORDINAL_POSITION",
        )
        .await
        .map_err(|e| EngineError::SchemaRead(e.into()))?
        .into_first_result()
        .await
        .map_err(|e| EngineError::SchemaRead(e.into()))?;

    for row in &col_rows {
        let schema: &str = row.get("TABLE_SCHEMA").unwrap_or_default();
        let table: &str = row.get("TABLE_NAME").unwrap_or_default();
        let name: &str = row.get("COLUMN_NAME").unwrap_or_default();
        let data_type: &str = row.get("DATA_TYPE").unwrap_or_default();
        let is_nullable: &str = row.get("IS_NULLABLE").unwrap_or_default();
        let ordinal: i32 = row.get("ORDINAL_POSITION").unwrap_or_default();

        let key = (schema.to_string(), table.to_string(), name.to_string());
        data.columns.push(RawColumn {
            schema: schema.to_string(),
            table: table.to_string(),
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_nullable: is_nullable.trim() == "YES",
            is_primary_key: pk_set.contains(&key),
            is_identity: identity_set.contains(&key),
            ordinal_position: ordinal.max(0) as usize,
        });
    }

    let fk_rows = client
        .simple_query(
            "SELECT \
               fk_schema.name AS child_schema, fk_tab.name AS child_table, fk_col.name AS child_column, \
               pk_schema.name AS parent_schema, pk_tab.name AS parent_table, pk_col.name AS parent_column \
             FROM sys.foreign_key_columns fkc \
             JOIN sys.tables fk_tab ON fkc.parent_object_id = fk_tab.object_id \
             JOIN sys.schemas fk_schema ON fk_tab.schema_id = fk_schema.schema_id \
             JOIN sys.columns fk_col ON fkc.parent_object_id = fk_col.object_id AND fkc.parent_column_id = fk_col.column_id \
             JOIN sys.tables pk_tab ON fkc.referenced_object_id = pk_tab.object_id \
             JOIN sys.schemas pk_schema ON pk_tab.schema_id = pk_schema.schema_id \
             JOIN sys.columns pk_col ON fkc.referenced_object_id = pk_col.object_id AND fkc.referenced_column_id = pk_col.column_id",
        )
        .await
        .map_err(|e| EngineError::SchemaRead(e.into()))?
        .into_first_result()
        .await
        .map_err(|e| EngineError::SchemaRead(e.into()))?;

    for row in &fk_rows {
        let child_schema: &str = row.get("child_schema").unwrap_or_default();
        let child_table: &str = row.get("child_table").unwrap_or_default();
        let child_column: &str = row.get("child_column").unwrap_or_default();
        let parent_schema: &str = row.get("parent_schema").unwrap_or_default();
        let parent_table: &str = row.get("parent_table").unwrap_or_default();
        let parent_column: &str = row.get("parent_column").unwrap_or_default();

        data.foreign_keys.push(RawForeignKey {
            child_schema: child_schema.to_string(),
            child_table: child_table.to_string(),
            child_column: child_column.to_string(),
            parent_schema: parent_schema.to_string(),
            parent_table: parent_table.to_string(),
            parent_column: parent_column.to_string(),
        });
    }

    Ok(data)
}
