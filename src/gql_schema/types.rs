//! Maps a [`Column`]'s native/effective data type to a GraphQL scalar kind,
//! used both for the object field's `TypeRef` and for picking which shared
//! `Filter<Kind>Input` a column's filter field references (spec.md §4.4).

use async_graphql::dynamic::TypeRef;

use crate::model::Column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Int,
    Float,
    String,
    Boolean,
}

impl ScalarKind {
    /// Name of the built-in GraphQL scalar this kind renders as.
    pub fn type_ref_name(self) -> &'static str {
        match self {
            ScalarKind::Int => TypeRef::INT,
            ScalarKind::Float => TypeRef::FLOAT,
            ScalarKind::String => TypeRef::STRING,
            ScalarKind::Boolean => TypeRef::BOOLEAN,
        }
    }

    /// Name of the shared filter input object for this kind
    /// (`FilterIntInput`, `FilterStringInput`, ...).
    pub fn filter_input_name(self) -> &'static str {
        match self {
            ScalarKind::Int => "FilterIntInput",
            ScalarKind::Float => "FilterFloatInput",
            ScalarKind::String => "FilterStringInput",
            ScalarKind::Boolean => "FilterBooleanInput",
        }
    }

    pub fn all() -> [ScalarKind; 4] {
        [ScalarKind::Int, ScalarKind::Float, ScalarKind::String, ScalarKind::Boolean]
    }
}

/// Classifies a column's effective data type (native token, or the
/// `metadata.type` override) into the coarse scalar kind GraphQL needs.
/// Unrecognized native types fall back to `String`, matching the "custom
/// types -> String fallback" convention used by dynamic-schema generators
/// elsewhere in the ecosystem.
pub fn scalar_kind(column: &Column) -> ScalarKind {
    let t = column.effective_data_type().to_ascii_lowercase();
    if t.contains("bool") {
        ScalarKind::Boolean
    } else if t.contains("int") || t.contains("serial") {
        ScalarKind::Int
    } else if t.contains("float")
        || t.contains("double")
        || t.contains("real")
        || t.contains("numeric")
        || t.contains("decimal")
        || t.contains("money")
    {
        ScalarKind::Float
    } else {
        ScalarKind::String
    }
}

/// The GraphQL output `TypeRef` for a column: the scalar matching its kind,
/// non-null iff the column disallows SQL NULL.
pub fn column_type_ref(column: &Column) -> TypeRef {
    let name = scalar_kind(column).type_ref_name();
    if column.is_nullable {
        TypeRef::named(name)
    } else {
        TypeRef::named_nn(name)
    }
}
