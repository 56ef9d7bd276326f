//! Lowers a resolved GraphQL selection into the query tree (spec.md §4.5, component C5).
//!
//! async-graphql's dynamic schema module already parses, validates, and
//! substitutes variables before a resolver runs; the selection reaches the
//! engine as a [`SelectionField`] tree (`ctx.field()`), the practical
//! equivalent of the raw AST spec.md describes walking. This module performs
//! exactly the classification spec.md §4.5 lists — root table selection,
//! paged-envelope `data` wrapper, join sentinel, link traversal, column
//! selection, fragment spread — over that tree instead of a hand-rolled
//! parser, the way `async_graphql::dynamic` consumers are meant to.

use async_graphql::context::SelectionField;
use async_graphql::{Name, Value};

use crate::error::EngineError;
use crate::model::{DbModel, Table};

use super::filter::{Filter, FilterOp, FilterValue};
use super::{Join, JoinKind, JoinOrigin, PendingLink, SortEntry, TableQuery};

const JOIN_PREFIX: &str = "_join_";
const SINGLE_JOIN_PREFIX: &str = "_single_";

/// Build a [`TableQuery`] for a root selection already known to target `table`.
/// `include_meta` is set by the schema builder when the root field is the
/// `_paged` variant (spec.md §4.4).
pub fn build_table_query(
    field: SelectionField<'_>,
    table: &Table,
    model: &DbModel,
    include_meta: bool,
) -> Result<TableQuery, EngineError> {
    let mut query = TableQuery::new(table.name.clone());
    query.include_meta = include_meta;
    apply_arguments(field, &mut query)?;

    // Step 2 of spec.md §4.5: a `data` wrapper on a paged envelope flips
    // `processingResult` so subsequent fields populate the inner object.
    let body = if include_meta {
        field
            .selection_set()
            .find(|f| f.name() == "data")
            .unwrap_or(field)
    } else {
        field
    };
    query.processing_result = include_meta;

    populate_children(body, table, model, &mut query)?;
    Ok(query)
}

fn populate_children(
    field: SelectionField<'_>,
    table: &Table,
    model: &DbModel,
    query: &mut TableQuery,
) -> Result<(), EngineError> {
    for child in field.selection_set() {
        let name = child.name();

        if name.starts_with("__") {
            continue; // introspection sentinels (__typename etc.), never part of the model
        }

        if let Some(target_name) = name.strip_prefix(JOIN_PREFIX) {
            query.joins.push(build_dynamic_join(child, &table.name, target_name, model, JoinKind::Multi)?);
            continue;
        }
        if let Some(target_name) = name.strip_prefix(SINGLE_JOIN_PREFIX) {
            query.joins.push(build_dynamic_join(child, &table.name, target_name, model, JoinKind::Single)?);
            continue;
        }

        if let Some(&link_idx) = table.single_links.get(name).or_else(|| table.multi_links.get(name)) {
            let link = model.link(link_idx);
            let target_table = &model.tables[if table.single_links.contains_key(name) {
                link.parent_table
            } else {
                link.child_table
            }];
            let mut child_query = TableQuery::new(target_table.name.clone());
            if let Some(alias) = child.alias() {
                child_query.alias = Some(alias.to_string());
            }
            apply_arguments(child, &mut child_query)?;
            populate_children(child, target_table, model, &mut child_query)?;
            query.links.push(PendingLink {
                field_name: name.to_string(),
                alias: child.alias().map(str::to_string),
                child: Box::new(child_query),
            });
            continue;
        }

        if table.column_by_graphql_name(name).is_some() {
            query.columns.push(name.to_string());
            continue;
        }

        // Fragment spreads are already expanded into the selection set by
        // async-graphql's look-ahead API; an unrecognized field name is recorded
        // for the reduction pass documented in spec.md §4.5 rather than treated
        // as an error, preserving forward compatibility with unknown fields.
        query.fragment_spreads.push(name.to_string());
    }
    Ok(())
}

fn build_dynamic_join(
    field: SelectionField<'_>,
    from_table: &str,
    target_graphql_name: &str,
    model: &DbModel,
    kind: JoinKind,
) -> Result<Join, EngineError> {
    let target = model.table_by_graphql_name(target_graphql_name).ok_or_else(|| {
        EngineError::UnknownLink {
            table: String::new(),
            link: target_graphql_name.to_string(),
        }
    })?;

    let args = field
        .arguments()
        .map_err(|e| EngineError::MissingVariable(e.message))?;

    let mut from_column = String::new();
    let mut to_column = String::new();
    let mut filter = None;
    let mut sort = Vec::new();
    let mut limit = None;
    let mut offset = None;

    for (name, value) in &args {
        match name.as_str() {
            "on" => {
                if let Value::List(items) = value {
                    if let [Value::String(a), Value::String(b)] = items.as_slice() {
                        from_column = a.clone();
                        to_column = b.clone();
                    }
                }
            }
            "filter" => filter = Some(parse_filter(value)?),
            "sort" => sort = parse_sort(value)?,
            "limit" => limit = parse_int(value),
            "offset" => offset = parse_offset(value)?,
            _ => {}
        }
    }

    let mut child_query = TableQuery::new(target.name.clone());
    child_query.filter = filter;
    child_query.sort = sort;
    child_query.limit = limit;
    child_query.offset = offset;
    populate_children(field, target, model, &mut child_query)?;

    Ok(Join {
        name: field.name().to_string(),
        alias: field.alias().map(str::to_string),
        kind,
        origin: JoinOrigin::Dynamic,
        from_table: from_table.to_string(),
        from_column,
        to_table: target.name.clone(),
        to_column,
        child: Box::new(child_query),
    })
}

/// Routes arguments through the equivalent of `startTableArgument` (spec.md §4.5):
/// `filter`, `sort`, `limit`, `offset` are recognized; anything else is ignored
/// silently to preserve forward compatibility.
fn apply_arguments(field: SelectionField<'_>, query: &mut TableQuery) -> Result<(), EngineError> {
    let args = field
        .arguments()
        .map_err(|e| EngineError::MissingVariable(e.message))?;

    for (name, value) in &args {
        match name.as_str() {
            "filter" => query.filter = Some(parse_filter(value)?),
            "sort" => query.sort = parse_sort(value)?,
            "limit" => query.limit = parse_int(value),
            "offset" => query.offset = parse_offset(value)?,
            _ => {}
        }
    }
    Ok(())
}

fn parse_sort(value: &Value) -> Result<Vec<SortEntry>, EngineError> {
    let Value::List(items) = value else { return Ok(Vec::new()) };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Value::String(s) = item else { continue };
        let mut parts = s.split_whitespace();
        let (Some(column), Some(dir), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(EngineError::Validation(format!("invalid sort entry '{s}'")));
        };
        let descending = match dir {
            "asc" => false,
            "desc" => true,
            other => return Err(EngineError::Validation(format!("invalid sort direction '{other}'"))),
        };
        if !column.chars().next().map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false) {
            return Err(EngineError::Validation(format!("invalid sort column '{column}'")));
        }
        out.push(SortEntry { column: column.to_string(), descending });
    }
    Ok(out)
}

fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// `offset` rejects negative values (spec.md §4.5: "rejects negative
/// offsets"), unlike `limit`, where `-1` is the explicit unbounded sentinel.
fn parse_offset(value: &Value) -> Result<Option<i64>, EngineError> {
    match parse_int(value) {
        Some(n) if n < 0 => Err(EngineError::Validation(format!("offset must not be negative, got {n}"))),
        other => Ok(other),
    }
}

/// Parses an object-literal filter argument into a [`Filter`] tree (spec.md §4.5,
/// §4.6). `_and`/`_or` keys recurse into connectives; every other key names a
/// column whose value is an object of `{_op: value}` entries, AND-composed.
fn parse_filter(value: &Value) -> Result<Filter, EngineError> {
    let Value::Object(map) = value else {
        return Err(EngineError::FilterType {
            column: String::new(),
            message: "filter argument must be an object".to_string(),
        });
    };

    let mut leaves = Vec::new();
    for (key, val) in map {
        let key_str = key.as_str();
        if key_str == "_and" {
            leaves.push(parse_connective(val)?.0);
            continue;
        }
        if key_str == "_or" {
            leaves.push(parse_connective(val)?.1);
            continue;
        }
        leaves.push(parse_column_filter(key_str, val)?);
    }

    Ok(match leaves.len() {
        0 => Filter::And(Vec::new()),
        1 => leaves.into_iter().next().unwrap(),
        _ => Filter::And(leaves),
    })
}

fn parse_connective(value: &Value) -> Result<(Filter, Filter), EngineError> {
    let Value::List(items) = value else {
        return Err(EngineError::FilterType {
            column: String::new(),
            message: "_and/_or expects a list".to_string(),
        });
    };
    let mut children = Vec::with_capacity(items.len());
    for item in items {
        children.push(parse_filter(item)?);
    }
    Ok((Filter::And(children.clone()), Filter::Or(children)))
}

fn parse_column_filter(column: &str, value: &Value) -> Result<Filter, EngineError> {
    let Value::Object(ops) = value else {
        return Err(EngineError::FilterType {
            column: column.to_string(),
            message: "expected an object of operator keys".to_string(),
        });
    };

    let mut leaves = Vec::new();
    for (suffix_name, op_value) in ops {
        let suffix = format!("_{}", suffix_name.as_str());
        let op = FilterOp::from_suffix(&suffix).ok_or_else(|| EngineError::FilterType {
            column: column.to_string(),
            message: format!("unknown filter operator '{suffix}'"),
        })?;
        let filter_value = to_filter_value(op, op_value, column)?;
        leaves.push(Filter::leaf(column, op, filter_value));
    }

    Ok(match leaves.len() {
        0 => Filter::And(Vec::new()),
        1 => leaves.into_iter().next().unwrap(),
        _ => Filter::And(leaves),
    })
}

fn to_filter_value(op: FilterOp, value: &Value, column: &str) -> Result<FilterValue, EngineError> {
    if op.is_unary() {
        return Ok(FilterValue::Null);
    }
    if op.is_list() || op.is_pair() {
        let Value::List(items) = value else {
            return Err(EngineError::FilterType {
                column: column.to_string(),
                message: format!("operator {op:?} expects a list value"),
            });
        };
        return Ok(FilterValue::List(
            items.iter().map(scalar_value).collect::<Result<_, _>>().map_err(|_| EngineError::FilterType {
                column: column.to_string(),
                message: "unsupported list element".to_string(),
            })?,
        ));
    }
    scalar_value(value).map_err(|_| EngineError::FilterType {
        column: column.to_string(),
        message: "unsupported scalar value".to_string(),
    })
}

/// Converts a GraphQL input object's fields (e.g. an `insert`/`update`
/// mutation argument) into the same [`FilterValue`] shape filter leaves use,
/// so the mutation engine (spec.md §4.9) and the filter renderer share one
/// value representation all the way down to parameter binding.
pub fn object_to_values(value: &Value) -> Result<std::collections::HashMap<String, FilterValue>, EngineError> {
    let Value::Object(map) = value else {
        return Err(EngineError::FilterType {
            column: String::new(),
            message: "mutation input must be an object".to_string(),
        });
    };
    map.iter()
        .map(|(k, v)| Ok((k.as_str().to_string(), scalar_value(v).map_err(|_| EngineError::FilterType {
            column: k.as_str().to_string(),
            message: "unsupported mutation input value".to_string(),
        })?)))
        .collect()
}

fn scalar_value(value: &Value) -> Result<FilterValue, ()> {
    Ok(match value {
        Value::String(s) => FilterValue::String(s.clone()),
        Value::Enum(e) => FilterValue::String(e.as_str().to_string()),
        Value::Boolean(b) => FilterValue::Bool(*b),
        Value::Null => FilterValue::Null,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                FilterValue::Int(i)
            } else if let Some(f) = n.as_f64() {
                FilterValue::Float(f)
            } else {
                return Err(());
            }
        }
        Value::List(items) => FilterValue::List(items.iter().map(scalar_value).collect::<Result<_, _>>()?),
        _ => return Err(()),
    })
}

/// Accessor used by the argument-parsing helpers above; kept separate so the
/// `Name` import isn't reported unused when arguments() returns `(Name, Value)`.
trait NameExt {
    fn as_str(&self) -> &str;
}
impl NameExt for Name {
    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_offset_accepts_zero_and_positive() {
        assert_eq!(parse_offset(&Value::Number(0i64.into())).unwrap(), Some(0));
        assert_eq!(parse_offset(&Value::Number(5i64.into())).unwrap(), Some(5));
    }

    #[test]
    fn parse_offset_rejects_negative() {
        let err = parse_offset(&Value::Number((-5i64).into())).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn parse_offset_ignores_non_numeric() {
        assert_eq!(parse_offset(&Value::Null).unwrap(), None);
    }
}
