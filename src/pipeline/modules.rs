//! Built-in filter/mutation transformers that read their behavior out of
//! per-table metadata (`tenant-filter`, `soft-delete`, `soft-delete-by`,
//! `populate: created-by` — spec.md §6) rather than being configured in
//! code. These are the "tenant isolation, soft-delete, auditing" modules
//! spec.md §1 item 4 and §4.7 describe; every other `FilterTransformer`/
//! `MutationTransformer` a deployment wants is registered the same way
//! through [`super::PipelineBuilder`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::model::DbModel;
use crate::query_tree::{Filter, FilterOp, FilterValue};

use super::{FilterTransformer, MutationOp, MutationTransformer, UserContext};

/// AND-composes `<tenant-filter column> = ctx.claims["tenant_id"]` for every
/// table carrying a `tenant-filter` metadata entry. Aborts with
/// `UserVisibleError` if the table requires tenancy and the context carries
/// none — scenario F in spec.md §8.
pub struct TenantFilterTransformer {
    model: Arc<DbModel>,
    claim_key: String,
}

impl TenantFilterTransformer {
    pub fn new(model: Arc<DbModel>) -> Self {
        Self { model, claim_key: "tenant_id".to_string() }
    }

    pub fn with_claim_key(model: Arc<DbModel>, claim_key: impl Into<String>) -> Self {
        Self { model, claim_key: claim_key.into() }
    }
}

impl FilterTransformer for TenantFilterTransformer {
    fn priority(&self) -> i32 {
        10
    }

    fn transform(
        &self,
        table: &str,
        current: Option<Filter>,
        ctx: &UserContext,
    ) -> Result<Filter, crate::error::EngineError> {
        let Some(table) = self.model.table_by_raw_name(table) else {
            return Ok(current.unwrap_or(Filter::And(Vec::new())));
        };
        let Some(column) = table.metadata.get("tenant-filter") else {
            return Ok(current.unwrap_or(Filter::And(Vec::new())));
        };
        let raw = ctx.get(&self.claim_key).ok_or_else(|| {
            crate::error::EngineError::UserVisible(format!(
                "missing {} for tenant-scoped table {}",
                self.claim_key, table.name
            ))
        })?;
        let value = match raw.parse::<i64>() {
            Ok(n) => FilterValue::Int(n),
            Err(_) => FilterValue::String(raw.to_string()),
        };
        let leaf = Filter::leaf(column.clone(), FilterOp::Eq, value);
        Ok(match current {
            Some(existing) => existing.and_with(leaf),
            None => leaf,
        })
    }
}

/// AND-composes `<soft-delete column> IS NULL` for every table carrying a
/// `soft-delete` metadata entry, hiding soft-deleted rows from ordinary
/// reads. Priority 50 so it layers after tenant isolation but ahead of
/// application-supplied filters (spec.md §4.7 ranges).
pub struct SoftDeleteFilterTransformer {
    model: Arc<DbModel>,
}

impl SoftDeleteFilterTransformer {
    pub fn new(model: Arc<DbModel>) -> Self {
        Self { model }
    }
}

impl FilterTransformer for SoftDeleteFilterTransformer {
    fn priority(&self) -> i32 {
        50
    }

    fn transform(
        &self,
        table: &str,
        current: Option<Filter>,
        _ctx: &UserContext,
    ) -> Result<Filter, crate::error::EngineError> {
        let Some(table) = self.model.table_by_raw_name(table) else {
            return Ok(current.unwrap_or(Filter::And(Vec::new())));
        };
        let Some(column) = table.metadata.get("soft-delete") else {
            return Ok(current.unwrap_or(Filter::And(Vec::new())));
        };
        let leaf = Filter::leaf(column.clone(), FilterOp::Null, FilterValue::Null);
        Ok(match current {
            Some(existing) => existing.and_with(leaf),
            None => leaf,
        })
    }
}

/// Rewrites `delete(pk)` into `update({ <soft-delete>: now(), <soft-delete-by>: ctx.user_id })`
/// for any table carrying a `soft-delete` metadata entry, per spec.md §4.7
/// item 2's own example. Tables without the metadata pass `delete` through
/// untouched.
pub struct SoftDeleteMutationTransformer {
    model: Arc<DbModel>,
}

impl SoftDeleteMutationTransformer {
    pub fn new(model: Arc<DbModel>) -> Self {
        Self { model }
    }
}

impl MutationTransformer for SoftDeleteMutationTransformer {
    fn transform(
        &self,
        op: MutationOp,
        mut data: HashMap<String, FilterValue>,
        table: &str,
        ctx: &UserContext,
    ) -> Result<(MutationOp, HashMap<String, FilterValue>), crate::error::EngineError> {
        if op != MutationOp::Delete {
            return Ok((op, data));
        }
        let Some(table) = self.model.table_by_raw_name(table) else {
            return Ok((op, data));
        };
        let Some(deleted_at_col) = table.metadata.get("soft-delete") else {
            return Ok((op, data));
        };
        let deleted_at = table
            .column_by_name(deleted_at_col)
            .map(|c| c.graphql_name.clone())
            .unwrap_or_else(|| deleted_at_col.clone());
        data.insert(deleted_at, FilterValue::String(Utc::now().to_rfc3339()));

        if let Some(by_col) = table.metadata.get("soft-delete-by") {
            if let Some(user_id) = ctx.get("user_id") {
                let by_field = table
                    .column_by_name(by_col)
                    .map(|c| c.graphql_name.clone())
                    .unwrap_or_else(|| by_col.clone());
                data.insert(by_field, FilterValue::String(user_id.to_string()));
            }
        }

        Ok((MutationOp::Update, data))
    }
}

/// Populates an auditing column on insert, e.g. `populate: created-by`
/// (spec.md §6). Driven by a `(metadata-value -> column-name, ctx-claim)`
/// mapping so the same transformer covers `created-by`/`updated-by`/etc
/// without one struct per column.
pub struct PopulateContextTransformer {
    model: Arc<DbModel>,
    /// `metadata-value -> claim key to read from [`UserContext`]`.
    bindings: Vec<(&'static str, &'static str)>,
}

impl PopulateContextTransformer {
    /// The default binding set: `populate: created-by` fills the target
    /// column from `ctx.claims["user_id"]` on insert only.
    pub fn new(model: Arc<DbModel>) -> Self {
        Self { model, bindings: vec![("created-by", "user_id")] }
    }
}

impl MutationTransformer for PopulateContextTransformer {
    fn transform(
        &self,
        op: MutationOp,
        mut data: HashMap<String, FilterValue>,
        table: &str,
        ctx: &UserContext,
    ) -> Result<(MutationOp, HashMap<String, FilterValue>), crate::error::EngineError> {
        if op != MutationOp::Insert {
            return Ok((op, data));
        }
        let Some(table) = self.model.table_by_raw_name(table) else {
            return Ok((op, data));
        };
        for column in &table.columns {
            let Some(directive) = column.metadata.get("populate") else { continue };
            for (value, claim) in &self.bindings {
                if directive == value {
                    if let Some(claim_value) = ctx.get(claim) {
                        data.entry(column.graphql_name.clone())
                            .or_insert_with(|| FilterValue::String(claim_value.to_string()));
                    }
                }
            }
        }
        Ok((op, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetadataOverlay;
    use crate::model::{DbModel, DbModelBuilder};
    use crate::schema_reader::{RawColumn, RawTable, SchemaData};
    use std::collections::HashMap as Map;

    fn model_with_table(name: &str, table_metadata: Map<String, String>, column_metadata: Map<&str, Map<String, String>>) -> Arc<DbModel> {
        let schema_data = SchemaData {
            tables: vec![RawTable { schema: String::new(), name: name.to_string(), is_view: false }],
            columns: ["id", "name", "deleted_at", "created_by"]
                .into_iter()
                .enumerate()
                .map(|(i, c)| RawColumn {
                    schema: String::new(),
                    table: name.to_string(),
                    name: c.to_string(),
                    data_type: "text".to_string(),
                    is_nullable: true,
                    is_primary_key: c == "id",
                    is_identity: c == "id",
                    ordinal_position: i,
                })
                .collect(),
            foreign_keys: Vec::new(),
        };

        let overlay = MetadataOverlay {
            model: Map::new(),
            tables: Map::from([(name.to_string(), table_metadata)]),
            columns: column_metadata
                .into_iter()
                .map(|(col, meta)| (format!("{name}.{col}"), meta))
                .collect(),
        };

        Arc::new(DbModelBuilder::new(schema_data, overlay).build())
    }

    #[test]
    fn tenant_filter_is_noop_without_metadata() {
        let model = model_with_table("widgets", Map::new(), Map::new());
        let t = TenantFilterTransformer::new(model);
        let ctx = UserContext::default();
        let result = t.transform("widgets", None, &ctx).unwrap();
        assert_eq!(result, Filter::And(Vec::new()));
    }

    #[test]
    fn tenant_filter_aborts_without_claim() {
        let mut meta = Map::new();
        meta.insert("tenant-filter".to_string(), "tenant_id".to_string());
        let model = model_with_table("widgets", meta, Map::new());
        let t = TenantFilterTransformer::new(model);
        let ctx = UserContext::default();
        let err = t.transform("widgets", None, &ctx).unwrap_err();
        assert!(matches!(err, crate::error::EngineError::UserVisible(_)));
    }

    #[test]
    fn soft_delete_mutation_rewrites_delete_into_update() {
        let mut meta = Map::new();
        meta.insert("soft-delete".to_string(), "deleted_at".to_string());
        meta.insert("soft-delete-by".to_string(), "created_by".to_string());
        let model = model_with_table("widgets", meta, Map::new());
        let t = SoftDeleteMutationTransformer::new(model);
        let mut ctx = UserContext::default();
        ctx.claims.insert("user_id".to_string(), "7".to_string());

        let (op, data) = t.transform(MutationOp::Delete, Map::from([("id".to_string(), FilterValue::Int(1))]), "widgets", &ctx).unwrap();
        assert_eq!(op, MutationOp::Update);
        assert!(data.contains_key("deleted_at"));
        assert_eq!(data.get("created_by"), Some(&FilterValue::String("7".to_string())));
    }

    #[test]
    fn populate_created_by_fills_only_insert() {
        let mut col_meta = Map::new();
        col_meta.insert("created_by", Map::from([("populate".to_string(), "created-by".to_string())]));
        let model = model_with_table("widgets", Map::new(), col_meta);
        let t = PopulateContextTransformer::new(model);
        let mut ctx = UserContext::default();
        ctx.claims.insert("user_id".to_string(), "99".to_string());

        let (_, data) = t.transform(MutationOp::Insert, Map::new(), "widgets", &ctx).unwrap();
        assert_eq!(data.get("created_by"), Some(&FilterValue::String("99".to_string())));

        let (_, data) = t.transform(MutationOp::Update, Map::new(), "widgets", &ctx).unwrap();
        assert!(!data.contains_key("created_by"));
    }
}
