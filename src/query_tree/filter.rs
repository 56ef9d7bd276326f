//! Filter / argument model (spec.md §3, §4.6, component C6).
//!
//! A recursive, algebraic AST: leaves are `(column, op, value)`; internal
//! nodes are `AND`/`OR`. Values reach the compiler as [`FilterValue`] and are
//! bound as query parameters, never interpolated into SQL text.

use std::fmt;

/// One of the comparison/membership/null operators a filter leaf can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    NContains,
    StartsWith,
    EndsWith,
    Like,
    NLike,
    In,
    NIn,
    Between,
    NBetween,
    Null,
    NNull,
}

impl FilterOp {
    /// Parse the `_eq`, `_neq`, ... GraphQL argument-field suffix into an operator.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "_eq" => FilterOp::Eq,
            "_neq" => FilterOp::Neq,
            "_lt" => FilterOp::Lt,
            "_lte" => FilterOp::Lte,
            "_gt" => FilterOp::Gt,
            "_gte" => FilterOp::Gte,
            "_contains" => FilterOp::Contains,
            "_ncontains" => FilterOp::NContains,
            "_starts_with" => FilterOp::StartsWith,
            "_ends_with" => FilterOp::EndsWith,
            "_like" => FilterOp::Like,
            "_nlike" => FilterOp::NLike,
            "_in" => FilterOp::In,
            "_nin" => FilterOp::NIn,
            "_between" => FilterOp::Between,
            "_nbetween" => FilterOp::NBetween,
            "_null" => FilterOp::Null,
            "_nnull" => FilterOp::NNull,
            _ => return None,
        })
    }

    pub fn as_suffix(self) -> &'static str {
        match self {
            FilterOp::Eq => "_eq",
            FilterOp::Neq => "_neq",
            FilterOp::Lt => "_lt",
            FilterOp::Lte => "_lte",
            FilterOp::Gt => "_gt",
            FilterOp::Gte => "_gte",
            FilterOp::Contains => "_contains",
            FilterOp::NContains => "_ncontains",
            FilterOp::StartsWith => "_starts_with",
            FilterOp::EndsWith => "_ends_with",
            FilterOp::Like => "_like",
            FilterOp::NLike => "_nlike",
            FilterOp::In => "_in",
            FilterOp::NIn => "_nin",
            FilterOp::Between => "_between",
            FilterOp::NBetween => "_nbetween",
            FilterOp::Null => "_null",
            FilterOp::NNull => "_nnull",
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(self, FilterOp::Null | FilterOp::NNull)
    }

    pub fn is_list(self) -> bool {
        matches!(self, FilterOp::In | FilterOp::NIn)
    }

    pub fn is_pair(self) -> bool {
        matches!(self, FilterOp::Between | FilterOp::NBetween)
    }
}

/// A scalar (or list-of-scalar) value bound into a filter leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    List(Vec<FilterValue>),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::String(s) => write!(f, "{s:?}"),
            FilterValue::Int(i) => write!(f, "{i}"),
            FilterValue::Float(v) => write!(f, "{v}"),
            FilterValue::Bool(b) => write!(f, "{b}"),
            FilterValue::Null => write!(f, "null"),
            FilterValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A single `(column, operator, value)` predicate, or a boolean combinator
/// over child filters.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Leaf {
        column: String,
        op: FilterOp,
        value: FilterValue,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn leaf(column: impl Into<String>, op: FilterOp, value: FilterValue) -> Self {
        Filter::Leaf {
            column: column.into(),
            op,
            value,
        }
    }

    /// AND-compose `self` with `other`, flattening nested `And` nodes so that
    /// repeated application (e.g. by two filter transformers in sequence, or
    /// the same transformer applied twice — spec.md §4.7 idempotence) produces
    /// a stable shape rather than ever-deeper nesting.
    pub fn and_with(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::And(mut a), Filter::And(b)) => {
                a.extend(b);
                Filter::And(a)
            }
            (Filter::And(mut a), b) => {
                a.push(b);
                Filter::And(a)
            }
            (a, Filter::And(mut b)) => {
                b.insert(0, a);
                Filter::And(b)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// Structural equality up to leaf ordering within AND/OR nodes (spec.md §8
    /// property 2: round-trip filter identity).
    pub fn equivalent(&self, other: &Filter) -> bool {
        match (self, other) {
            (
                Filter::Leaf { column: c1, op: o1, value: v1 },
                Filter::Leaf { column: c2, op: o2, value: v2 },
            ) => c1 == c2 && o1 == o2 && v1 == v2,
            (Filter::And(a), Filter::And(b)) | (Filter::Or(a), Filter::Or(b)) => {
                a.len() == b.len()
                    && a.iter().all(|x| b.iter().any(|y| x.equivalent(y)))
                    && b.iter().all(|y| a.iter().any(|x| x.equivalent(y)))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_with_flattens_existing_and_nodes() {
        let base = Filter::And(vec![Filter::leaf("a", FilterOp::Eq, FilterValue::Int(1))]);
        let combined = base.and_with(Filter::leaf("b", FilterOp::Eq, FilterValue::Int(2)));
        match combined {
            Filter::And(children) => assert_eq!(children.len(), 2),
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn equivalent_ignores_and_or_child_order() {
        let f1 = Filter::Or(vec![
            Filter::leaf("role", FilterOp::Eq, FilterValue::String("admin".into())),
            Filter::leaf("role", FilterOp::Eq, FilterValue::String("editor".into())),
        ]);
        let f2 = Filter::Or(vec![
            Filter::leaf("role", FilterOp::Eq, FilterValue::String("editor".into())),
            Filter::leaf("role", FilterOp::Eq, FilterValue::String("admin".into())),
        ]);
        assert!(f1.equivalent(&f2));
    }
}
