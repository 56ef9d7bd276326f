//! Filter rendering: `Filter` tree → parameterized SQL boolean expression
//! (spec.md §4.6 "Filter rendering").

use crate::dialect::{Dialect, LikeKind};
use crate::error::EngineError;
use crate::query_tree::{Filter, FilterOp, FilterValue};

use super::params::ParamCollection;

/// Renders a complete `WHERE` clause (including the leading ` WHERE` and the
/// one parenthesis level that wraps the whole expression), or an empty string
/// when there's no filter.
pub fn render_where_clause(
    filter: Option<&Filter>,
    dialect: &dyn Dialect,
    params: &mut ParamCollection,
) -> Result<String, EngineError> {
    match filter {
        None => Ok(String::new()),
        Some(f) => Ok(format!(" WHERE ({})", render_filter(f, dialect, params)?)),
    }
}

/// Renders a filter expression with no outer parenthesis. Connective nodes
/// parenthesize each child individually (so nesting stays unambiguous) but
/// never wrap the joined result themselves — the caller (either another
/// connective one level up, or [`render_where_clause`]) owns that one
/// enclosing paren.
pub fn render_filter(
    filter: &Filter,
    dialect: &dyn Dialect,
    params: &mut ParamCollection,
) -> Result<String, EngineError> {
    match filter {
        Filter::Leaf { column, op, value } => render_leaf(column, *op, value, dialect, params),
        Filter::And(children) => render_connective(children, "AND", "1=1", dialect, params),
        Filter::Or(children) => render_connective(children, "OR", "1=0", dialect, params),
    }
}

fn render_connective(
    children: &[Filter],
    joiner: &str,
    empty: &str,
    dialect: &dyn Dialect,
    params: &mut ParamCollection,
) -> Result<String, EngineError> {
    if children.is_empty() {
        return Ok(empty.to_string());
    }
    let rendered: Vec<String> = children
        .iter()
        .map(|c| render_filter(c, dialect, params))
        .collect::<Result<_, _>>()?;
    Ok(rendered
        .iter()
        .map(|r| format!("({r})"))
        .collect::<Vec<_>>()
        .join(&format!(" {joiner} ")))
}

fn render_leaf(
    column: &str,
    op: FilterOp,
    value: &FilterValue,
    dialect: &dyn Dialect,
    params: &mut ParamCollection,
) -> Result<String, EngineError> {
    let col = dialect.escape_identifier(column);

    match op {
        FilterOp::Eq | FilterOp::Neq | FilterOp::Lt | FilterOp::Lte | FilterOp::Gt | FilterOp::Gte => {
            let scalar = expect_scalar(column, value)?;
            let p = params.push(dialect, scalar.clone());
            Ok(format!("{col} {} {p}", dialect.map_operator(op)))
        }
        FilterOp::Contains | FilterOp::NContains | FilterOp::StartsWith | FilterOp::EndsWith => {
            let scalar = expect_scalar(column, value)?;
            let p = params.push(dialect, scalar.clone());
            let kind = match op {
                FilterOp::Contains | FilterOp::NContains => LikeKind::Contains,
                FilterOp::StartsWith => LikeKind::StartsWith,
                FilterOp::EndsWith => LikeKind::EndsWith,
                _ => unreachable!(),
            };
            let pattern = dialect.like_pattern(&p, kind);
            let negate = matches!(op, FilterOp::NContains);
            Ok(format!("{col} {}LIKE {pattern}", if negate { "NOT " } else { "" }))
        }
        FilterOp::Like | FilterOp::NLike => {
            let scalar = expect_scalar(column, value)?;
            let p = params.push(dialect, scalar.clone());
            let negate = matches!(op, FilterOp::NLike);
            Ok(format!("{col} {}LIKE {p}", if negate { "NOT " } else { "" }))
        }
        FilterOp::In | FilterOp::NIn => {
            let items = expect_list(column, value)?;
            if items.is_empty() {
                return Ok(if matches!(op, FilterOp::In) { "1=0".to_string() } else { "1=1".to_string() });
            }
            let placeholders: Vec<String> = items.iter().map(|v| params.push(dialect, v.clone())).collect();
            let negate = matches!(op, FilterOp::NIn);
            Ok(format!("{col} {}IN ({})", if negate { "NOT " } else { "" }, placeholders.join(", ")))
        }
        FilterOp::Between | FilterOp::NBetween => {
            let items = expect_list(column, value)?;
            let [lo, hi] = <[FilterValue; 2]>::try_from(items.to_vec()).map_err(|_| EngineError::FilterType {
                column: column.to_string(),
                message: "_between/_nbetween expects exactly two values".to_string(),
            })?;
            let lo_p = params.push(dialect, lo);
            let hi_p = params.push(dialect, hi);
            let negate = matches!(op, FilterOp::NBetween);
            Ok(format!("{col} {}BETWEEN {lo_p} AND {hi_p}", if negate { "NOT " } else { "" }))
        }
        FilterOp::Null | FilterOp::NNull => {
            Ok(format!("{col} IS {}NULL", if matches!(op, FilterOp::NNull) { "NOT " } else { "" }))
        }
    }
}

fn expect_scalar<'a>(column: &str, value: &'a FilterValue) -> Result<&'a FilterValue, EngineError> {
    match value {
        FilterValue::List(_) => Err(EngineError::FilterType {
            column: column.to_string(),
            message: "expected a scalar value".to_string(),
        }),
        other => Ok(other),
    }
}

fn expect_list<'a>(column: &str, value: &'a FilterValue) -> Result<&'a [FilterValue], EngineError> {
    match value {
        FilterValue::List(items) => Ok(items),
        _ => Err(EngineError::FilterType {
            column: column.to_string(),
            message: "expected a list value".to_string(),
        }),
    }
}
