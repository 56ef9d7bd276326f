//! In-memory catalog snapshot (spec.md §3, component C3).
//!
//! A [`DbModel`] is built once per connection at schema load and replaced
//! atomically on refresh; in-flight requests keep using the snapshot they
//! started with (spec.md §5). Tables are stored in a flat `Vec` and
//! cross-referenced by index rather than owned pointers, per the design note
//! in spec.md §9 ("prefer indices into a Table array... avoids cycles").

mod builder;
mod names;

pub use builder::DbModelBuilder;
pub use names::{graphql_name, singularize};

use std::collections::HashMap;

/// `base` table vs. `view`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableType {
    Base,
    View,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub graphql_name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub is_identity: bool,
    pub ordinal_position: usize,
    pub metadata: HashMap<String, String>,
}

impl Column {
    /// `metadata.type` if set, else `data_type` — enables JSON-as-string overrides.
    pub fn effective_data_type(&self) -> &str {
        self.metadata.get("type").map(String::as_str).unwrap_or(&self.data_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Single,
    Multi,
}

/// A directed relationship inferred from a foreign-key constraint. Endpoints
/// are indices into [`DbModel::tables`], not owned references, so the whole
/// model stays a flat, shareable, acyclic-by-construction structure.
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    pub parent_table: usize,
    pub parent_column: String,
    pub child_table: usize,
    pub child_column: String,
    pub kind: LinkKind,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub graphql_name: String,
    pub normalized_name: String,
    pub table_type: TableType,
    pub columns: Vec<Column>,
    /// link name -> index into `DbModel.links`, where this table is the child.
    pub single_links: HashMap<String, usize>,
    /// link name -> index into `DbModel.links`, where this table is the parent.
    pub multi_links: HashMap<String, usize>,
    pub metadata: HashMap<String, String>,
}

impl Table {
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_by_graphql_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.graphql_name == name)
    }

    pub fn primary_key(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_primary_key).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Procedure {
    pub schema: String,
    pub name: String,
    pub graphql_name: String,
    pub description: Option<String>,
}

/// Process-wide, immutable catalog snapshot. Cheap to clone (wrap in `Arc` at
/// the call site — see [`crate::cache::PathCache`]) since tables/links are
/// never mutated after [`DbModelBuilder::build`] publishes them.
#[derive(Debug, Clone)]
pub struct DbModel {
    pub tables: Vec<Table>,
    pub links: Vec<Link>,
    pub stored_procedures: Vec<Procedure>,
    pub metadata: HashMap<String, String>,
    name_index: HashMap<String, usize>,
    graphql_index: HashMap<String, usize>,
}

impl DbModel {
    pub fn table_by_name(&self, schema: &str, name: &str) -> Option<&Table> {
        self.name_index
            .get(&format!("{schema}.{name}"))
            .map(|&i| &self.tables[i])
    }

    pub fn table_by_graphql_name(&self, name: &str) -> Option<&Table> {
        self.graphql_index.get(name).map(|&i| &self.tables[i])
    }

    /// Finds a table by its raw (non-GraphQL-escaped) name, ignoring schema.
    /// Used by the compiler and query tree, which carry table references by
    /// raw name rather than `(schema, name)` pairs.
    pub fn table_by_raw_name(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_index_by_raw_name(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.name == name)
    }

    pub fn table_index_by_graphql_name(&self, name: &str) -> Option<usize> {
        self.graphql_index.get(name).copied()
    }

    pub fn link(&self, index: usize) -> &Link {
        &self.links[index]
    }
}
