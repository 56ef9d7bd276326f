//! DbModel construction (spec.md §4.3).

use std::collections::{HashMap, HashSet};

use crate::config::MetadataOverlay;
use crate::schema_reader::SchemaData;

use super::names::{graphql_name, pluralize, singularize};
use super::{Column, DbModel, Link, LinkKind, Table, TableType};

pub struct DbModelBuilder {
    schema_data: SchemaData,
    overlay: MetadataOverlay,
}

impl DbModelBuilder {
    pub fn new(schema_data: SchemaData, overlay: MetadataOverlay) -> Self {
        Self { schema_data, overlay }
    }

    /// Steps 1-5 of spec.md §4.3: columns, tables, inferred links, metadata
    /// overlay, then publish an immutable snapshot.
    pub fn build(self) -> DbModel {
        let mut table_name_seen = HashSet::new();

        // Step 1 + 2: build Column/Table records, one table at a time, preserving
        // the reader's table ordering for determinism.
        let mut tables: Vec<Table> = self
            .schema_data
            .tables
            .iter()
            .map(|raw_table| {
                let mut columns: Vec<Column> = self
                    .schema_data
                    .columns
                    .iter()
                    .filter(|c| c.table == raw_table.name && c.schema == raw_table.schema)
                    .map(|c| {
                        let mut column_seen = HashSet::new();
                        Column {
                            name: c.name.clone(),
                            graphql_name: graphql_name(&c.name, &mut column_seen),
                            data_type: c.data_type.clone(),
                            is_nullable: c.is_nullable,
                            is_primary_key: c.is_primary_key,
                            is_identity: c.is_identity,
                            ordinal_position: c.ordinal_position,
                            metadata: self
                                .overlay
                                .columns
                                .get(&format!("{}.{}", raw_table.name, c.name))
                                .cloned()
                                .unwrap_or_default(),
                        }
                    })
                    .collect();
                columns.sort_by_key(|c| c.ordinal_position);

                // graphql_name clashes are disambiguated within the table's own column set.
                let mut seen = HashSet::new();
                for col in &mut columns {
                    col.graphql_name = graphql_name(&col.name, &mut seen);
                }

                let graphql_tbl_name = graphql_name(&raw_table.name, &mut table_name_seen);
                Table {
                    schema: raw_table.schema.clone(),
                    name: raw_table.name.clone(),
                    graphql_name: graphql_tbl_name,
                    normalized_name: singularize(&raw_table.name),
                    table_type: if raw_table.is_view { TableType::View } else { TableType::Base },
                    columns,
                    single_links: HashMap::new(),
                    multi_links: HashMap::new(),
                    metadata: self.overlay.tables.get(&raw_table.name).cloned().unwrap_or_default(),
                }
            })
            .collect();

        // Step 3: infer links from foreign keys.
        let mut links: Vec<Link> = Vec::new();
        for fk in &self.schema_data.foreign_keys {
            let child_idx = match tables
                .iter()
                .position(|t| t.name == fk.child_table && t.schema == fk.child_schema)
            {
                Some(i) => i,
                None => continue,
            };
            let parent_idx = match tables
                .iter()
                .position(|t| t.name == fk.parent_table && t.schema == fk.parent_schema)
            {
                Some(i) => i,
                None => continue,
            };

            let parent_normalized = tables[parent_idx].normalized_name.clone();
            let child_normalized = tables[child_idx].normalized_name.clone();

            // single link name: strip a trailing "id"/"_id" from the FK column,
            // falling back to the parent's normalized (singular) name.
            let stripped = fk
                .child_column
                .strip_suffix("_id")
                .or_else(|| fk.child_column.strip_suffix("Id"))
                .or_else(|| fk.child_column.strip_suffix("id"))
                .filter(|s| !s.is_empty());
            let single_name = stripped.map(str::to_string).unwrap_or(parent_normalized);
            let single_name = disambiguate_link_name(&tables[child_idx], &single_name);

            let multi_name = pluralize(&child_normalized);
            let multi_name = disambiguate_link_name(&tables[parent_idx], &multi_name);

            let link_index = links.len();
            links.push(Link {
                name: single_name.clone(),
                parent_table: parent_idx,
                parent_column: fk.parent_column.clone(),
                child_table: child_idx,
                child_column: fk.child_column.clone(),
                kind: LinkKind::Single,
            });
            tables[child_idx].single_links.insert(single_name, link_index);

            let multi_index = links.len();
            links.push(Link {
                name: multi_name.clone(),
                parent_table: parent_idx,
                parent_column: fk.parent_column.clone(),
                child_table: child_idx,
                child_column: fk.child_column.clone(),
                kind: LinkKind::Multi,
            });
            tables[parent_idx].multi_links.insert(multi_name, multi_index);
        }

        // Step 4: model-level metadata overlay.
        let metadata = self.overlay.model.clone();

        // Step 5: publish.
        let mut name_index = HashMap::new();
        let mut graphql_index = HashMap::new();
        for (i, t) in tables.iter().enumerate() {
            name_index.insert(format!("{}.{}", t.schema, t.name), i);
            graphql_index.insert(t.graphql_name.clone(), i);
        }

        DbModel {
            tables,
            links,
            stored_procedures: Vec::new(),
            metadata,
            name_index,
            graphql_index,
        }
    }
}

/// Collisions between a column name and a link name are resolved in favor of
/// the column, and the link is suffixed (spec.md §3 invariant 5).
fn disambiguate_link_name(table: &Table, candidate: &str) -> String {
    let collides_with_column = table.columns.iter().any(|c| c.name.eq_ignore_ascii_case(candidate));
    let collides_with_link =
        table.single_links.contains_key(candidate) || table.multi_links.contains_key(candidate);

    if collides_with_column || collides_with_link {
        format!("{candidate}_link")
    } else {
        candidate.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_reader::{RawColumn, RawForeignKey, RawTable};

    fn sample_schema() -> SchemaData {
        SchemaData {
            tables: vec![
                RawTable { schema: String::new(), name: "workshops".into(), is_view: false },
                RawTable { schema: String::new(), name: "sessions".into(), is_view: false },
            ],
            columns: vec![
                RawColumn {
                    schema: String::new(), table: "workshops".into(), name: "id".into(),
                    data_type: "INTEGER".into(), is_nullable: false, is_primary_key: true,
                    is_identity: true, ordinal_position: 0,
                },
                RawColumn {
                    schema: String::new(), table: "workshops".into(), name: "number".into(),
                    data_type: "TEXT".into(), is_nullable: true, is_primary_key: false,
                    is_identity: false, ordinal_position: 1,
                },
                RawColumn {
                    schema: String::new(), table: "sessions".into(), name: "id".into(),
                    data_type: "INTEGER".into(), is_nullable: false, is_primary_key: true,
                    is_identity: true, ordinal_position: 0,
                },
                RawColumn {
                    schema: String::new(), table: "sessions".into(), name: "workshopid".into(),
                    data_type: "INTEGER".into(), is_nullable: false, is_primary_key: false,
                    is_identity: false, ordinal_position: 1,
                },
            ],
            foreign_keys: vec![RawForeignKey {
                child_schema: String::new(), child_table: "sessions".into(), child_column: "workshopid".into(),
                parent_schema: String::new(), parent_table: "workshops".into(), parent_column: "id".into(),
            }],
        }
    }

    #[test]
    fn infers_single_and_multi_links() {
        let model = DbModelBuilder::new(sample_schema(), MetadataOverlay::empty()).build();
        let sessions = model.table_by_graphql_name("sessions").unwrap();
        assert!(sessions.single_links.contains_key("workshop"));
        let workshops = model.table_by_graphql_name("workshops").unwrap();
        assert!(workshops.multi_links.contains_key("sessions"));
    }

    #[test]
    fn every_single_link_has_matching_multi_link_on_target() {
        let model = DbModelBuilder::new(sample_schema(), MetadataOverlay::empty()).build();
        for table in &model.tables {
            for &link_idx in table.single_links.values() {
                let link = model.link(link_idx);
                let parent = &model.tables[link.parent_table];
                assert!(parent.multi_links.values().any(|&i| {
                    let l = model.link(i);
                    l.child_table == link.child_table && l.child_column == link.child_column
                }));
            }
        }
    }
}
