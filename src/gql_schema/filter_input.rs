//! `FilterT` input types and the shared `Filter<Kind>Input` operator sets
//! they're built from (spec.md §4.4).

use async_graphql::dynamic::{InputObject, InputValue, TypeRef};

use crate::model::Table;

use super::types::{scalar_kind, ScalarKind};

/// Name of the per-table filter input, e.g. `workshops` -> `FilterWorkshopsInput`.
pub fn filter_input_name(table: &Table) -> String {
    format!("Filter{}Input", pascal(&table.graphql_name))
}

fn pascal(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Builds the four shared scalar-kind filter inputs (`FilterIntInput`, ...)
/// once; every table's `FilterTInput` references these rather than
/// redeclaring the operator set per column.
pub fn build_scalar_filter_inputs() -> Vec<InputObject> {
    ScalarKind::all().into_iter().map(build_one).collect()
}

fn build_one(kind: ScalarKind) -> InputObject {
    let scalar = kind.type_ref_name();
    let mut input = InputObject::new(kind.filter_input_name());

    for op in ["_eq", "_neq", "_lt", "_lte", "_gt", "_gte"] {
        input = input.field(InputValue::new(op, TypeRef::named(scalar)));
    }
    for op in ["_in", "_nin"] {
        input = input.field(InputValue::new(op, TypeRef::named_list(scalar)));
    }
    for op in ["_between", "_nbetween"] {
        input = input.field(InputValue::new(op, TypeRef::named_list(scalar)));
    }
    for op in ["_null", "_nnull"] {
        input = input.field(InputValue::new(op, TypeRef::named(TypeRef::BOOLEAN)));
    }
    if matches!(kind, ScalarKind::String) {
        for op in ["_contains", "_ncontains", "_starts_with", "_ends_with", "_like", "_nlike"] {
            input = input.field(InputValue::new(op, TypeRef::named(scalar)));
        }
    }
    input
}

/// Builds `FilterTInput` for one table: one field per column, typed as the
/// matching `Filter<Kind>Input`, plus recursive `_and`/`_or` connectives.
pub fn build_table_filter_input(table: &Table) -> InputObject {
    let name = filter_input_name(table);
    let mut input = InputObject::new(&name);

    for column in &table.columns {
        let kind = scalar_kind(column);
        input = input.field(InputValue::new(&column.graphql_name, TypeRef::named(kind.filter_input_name())));
    }

    input = input.field(InputValue::new("_and", TypeRef::named_list(&name)));
    input = input.field(InputValue::new("_or", TypeRef::named_list(&name)));

    input
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_input_name_is_pascal_cased() {
        let mut table = crate::model::Table {
            schema: String::new(),
            name: "workshops".into(),
            graphql_name: "workshops".into(),
            normalized_name: "workshop".into(),
            table_type: crate::model::TableType::Base,
            columns: Vec::new(),
            single_links: Default::default(),
            multi_links: Default::default(),
            metadata: Default::default(),
        };
        assert_eq!(filter_input_name(&table), "FilterWorkshopsInput");
        table.graphql_name = "my_table".into();
        assert_eq!(filter_input_name(&table), "FilterMy_tableInput");
    }
}
