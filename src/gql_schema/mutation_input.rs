//! `InsertT`/`UpdateT`/`UpsertT`/`DeleteT` input types (spec.md §4.4, §4.9).

use async_graphql::dynamic::{InputObject, InputValue, TypeRef};

use crate::model::Table;

use super::types::scalar_kind;

pub fn insert_input_name(table: &Table) -> String {
    format!("Insert{}Input", pascal(&table.graphql_name))
}
pub fn update_input_name(table: &Table) -> String {
    format!("Update{}Input", pascal(&table.graphql_name))
}
pub fn upsert_input_name(table: &Table) -> String {
    format!("Upsert{}Input", pascal(&table.graphql_name))
}
pub fn delete_input_name(table: &Table) -> String {
    format!("Delete{}Input", pascal(&table.graphql_name))
}

fn pascal(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// `insert(T)` omits identity columns (spec.md §4.4): the database assigns
/// them. Every other column is required iff the column itself is NOT NULL.
pub fn build_insert_input(table: &Table) -> InputObject {
    let mut input = InputObject::new(insert_input_name(table));
    for column in &table.columns {
        if column.is_identity {
            continue;
        }
        let scalar = scalar_kind(column).type_ref_name();
        let ty = if column.is_nullable { TypeRef::named(scalar) } else { TypeRef::named_nn(scalar) };
        input = input.field(InputValue::new(&column.graphql_name, ty));
    }
    input
}

/// `update(T)` keys on the primary key (required); every other column is
/// optional (only present fields are written).
pub fn build_update_input(table: &Table) -> InputObject {
    let mut input = InputObject::new(update_input_name(table));
    for column in &table.columns {
        let scalar = scalar_kind(column).type_ref_name();
        let ty = if column.is_primary_key { TypeRef::named_nn(scalar) } else { TypeRef::named(scalar) };
        input = input.field(InputValue::new(&column.graphql_name, ty));
    }
    input
}

/// `upsert(T)`: same shape as update, since every engine's native upsert
/// clause needs the key columns present to match on (spec.md §4.9).
pub fn build_upsert_input(table: &Table) -> InputObject {
    let mut input = InputObject::new(upsert_input_name(table));
    for column in &table.columns {
        let scalar = scalar_kind(column).type_ref_name();
        let ty = if column.is_primary_key { TypeRef::named_nn(scalar) } else { TypeRef::named(scalar) };
        input = input.field(InputValue::new(&column.graphql_name, ty));
    }
    input
}

/// `delete(T)` requires only the primary key.
pub fn build_delete_input(table: &Table) -> InputObject {
    let mut input = InputObject::new(delete_input_name(table));
    for column in table.primary_key() {
        let scalar = scalar_kind(column).type_ref_name();
        input = input.field(InputValue::new(&column.graphql_name, TypeRef::named_nn(scalar)));
    }
    input
}
