//! `_dbSchema` meta-query: a read-only reflection of the [`DbModel`] (spec.md
//! §4.4 "The schema builder also exposes a `_dbSchema` meta-query reflecting
//! the DbModel"). Built once per schema load, like everything else under
//! [`super::GqlSchema`] — it never touches the pool.

use async_graphql::dynamic::{Object, SchemaBuilder, TypeRef};

use crate::model::{DbModel, TableType};

use super::json_field;

pub const TYPE: &str = "DbSchema";
pub const TABLE_TYPE: &str = "DbSchemaTable";
pub const COLUMN_TYPE: &str = "DbSchemaColumn";
pub const LINK_TYPE: &str = "DbSchemaLink";

/// Flattens `model` into the plain JSON document the generic [`json_field`]
/// resolvers below walk — built once at schema-build time and captured by the
/// `_dbSchema` root resolver, never recomputed per request.
pub fn build_value(model: &DbModel) -> serde_json::Value {
    let tables: Vec<serde_json::Value> = model
        .tables
        .iter()
        .map(|table| {
            let columns: Vec<serde_json::Value> = table
                .columns
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "name": c.name,
                        "graphqlName": c.graphql_name,
                        "dataType": c.effective_data_type(),
                        "nullable": c.is_nullable,
                        "primaryKey": c.is_primary_key,
                        "identity": c.is_identity,
                    })
                })
                .collect();

            let single_links: Vec<serde_json::Value> = table
                .single_links
                .iter()
                .map(|(name, &link_idx)| {
                    let link = model.link(link_idx);
                    serde_json::json!({
                        "name": name,
                        "targetTable": model.tables[link.parent_table].graphql_name,
                    })
                })
                .collect();

            let multi_links: Vec<serde_json::Value> = table
                .multi_links
                .iter()
                .map(|(name, &link_idx)| {
                    let link = model.link(link_idx);
                    serde_json::json!({
                        "name": name,
                        "targetTable": model.tables[link.child_table].graphql_name,
                    })
                })
                .collect();

            serde_json::json!({
                "name": table.name,
                "graphqlName": table.graphql_name,
                "schema": table.schema,
                "isView": matches!(table.table_type, TableType::View),
                "columns": columns,
                "singleLinks": single_links,
                "multiLinks": multi_links,
            })
        })
        .collect();

    serde_json::json!({ "tables": tables })
}

/// Registers `DbSchema`/`DbSchemaTable`/`DbSchemaColumn`/`DbSchemaLink`. The
/// root `_dbSchema` field itself is added alongside the other Query fields in
/// [`super::build_schema`], since it shares the generic query-field builder's
/// capture-a-precomputed-value shape.
pub fn register_types(builder: SchemaBuilder) -> SchemaBuilder {
    builder
        .register(
            Object::new(TYPE).field(json_field("tables", TypeRef::named_nn_list_nn(TABLE_TYPE))),
        )
        .register(
            Object::new(TABLE_TYPE)
                .field(json_field("name", TypeRef::named_nn(TypeRef::STRING)))
                .field(json_field("graphqlName", TypeRef::named_nn(TypeRef::STRING)))
                .field(json_field("schema", TypeRef::named_nn(TypeRef::STRING)))
                .field(json_field("isView", TypeRef::named_nn(TypeRef::BOOLEAN)))
                .field(json_field("columns", TypeRef::named_nn_list_nn(COLUMN_TYPE)))
                .field(json_field("singleLinks", TypeRef::named_nn_list_nn(LINK_TYPE)))
                .field(json_field("multiLinks", TypeRef::named_nn_list_nn(LINK_TYPE))),
        )
        .register(
            Object::new(COLUMN_TYPE)
                .field(json_field("name", TypeRef::named_nn(TypeRef::STRING)))
                .field(json_field("graphqlName", TypeRef::named_nn(TypeRef::STRING)))
                .field(json_field("dataType", TypeRef::named_nn(TypeRef::STRING)))
                .field(json_field("nullable", TypeRef::named_nn(TypeRef::BOOLEAN)))
                .field(json_field("primaryKey", TypeRef::named_nn(TypeRef::BOOLEAN)))
                .field(json_field("identity", TypeRef::named_nn(TypeRef::BOOLEAN))),
        )
        .register(
            Object::new(LINK_TYPE)
                .field(json_field("name", TypeRef::named_nn(TypeRef::STRING)))
                .field(json_field("targetTable", TypeRef::named_nn(TypeRef::STRING))),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetadataOverlay;
    use crate::model::DbModelBuilder;
    use crate::schema_reader::{RawColumn, RawForeignKey, RawTable, SchemaData};

    fn model() -> DbModel {
        let schema = SchemaData {
            tables: vec![
                RawTable { schema: String::new(), name: "workshops".into(), is_view: false },
                RawTable { schema: String::new(), name: "sessions".into(), is_view: false },
            ],
            columns: vec![
                RawColumn { schema: String::new(), table: "workshops".into(), name: "id".into(), data_type: "int".into(), is_nullable: false, is_primary_key: true, is_identity: true, ordinal_position: 0 },
                RawColumn { schema: String::new(), table: "sessions".into(), name: "sid".into(), data_type: "int".into(), is_nullable: false, is_primary_key: true, is_identity: true, ordinal_position: 0 },
                RawColumn { schema: String::new(), table: "sessions".into(), name: "workshopid".into(), data_type: "int".into(), is_nullable: false, is_primary_key: false, is_identity: false, ordinal_position: 1 },
            ],
            foreign_keys: vec![RawForeignKey {
                child_schema: String::new(), child_table: "sessions".into(), child_column: "workshopid".into(),
                parent_schema: String::new(), parent_table: "workshops".into(), parent_column: "id".into(),
            }],
        };
        DbModelBuilder::new(schema, MetadataOverlay::empty()).build()
    }

    #[test]
    fn reflects_tables_columns_and_links() {
        let value = build_value(&model());
        let tables = value["tables"].as_array().unwrap();
        assert_eq!(tables.len(), 2);
        let workshops = tables.iter().find(|t| t["name"] == "workshops").unwrap();
        assert_eq!(workshops["columns"].as_array().unwrap().len(), 1);
        assert!(!workshops["multiLinks"].as_array().unwrap().is_empty());
        let sessions = tables.iter().find(|t| t["name"] == "sessions").unwrap();
        assert!(!sessions["singleLinks"].as_array().unwrap().is_empty());
    }
}
