//! Module pipeline: three extension points applied in a strict order
//! (spec.md §4.7, component C8).

mod observer;
pub mod modules;

pub use observer::{ObserverPhase, QueryObserver};

use crate::error::EngineError;
use crate::query_tree::{Filter, TableQuery};

/// Per-request caller identity/claims threaded through transformers. Kept
/// intentionally open-shaped (a string bag) since the core has no opinion on
/// auth schemes — that is the transport's job (spec.md §1).
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub claims: std::collections::HashMap<String, String>,
}

impl UserContext {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.claims.get(key).map(String::as_str)
    }
}

/// Applied in increasing priority order per table before compilation.
/// Recommended ranges: 0-99 security/tenant, 100-199 data filtering, 200+
/// application (spec.md §4.7). May AND-compose with the existing filter or
/// abort the request with `UserVisibleError`.
pub trait FilterTransformer: Send + Sync {
    fn priority(&self) -> i32;
    fn transform(&self, table: &str, current: Option<Filter>, ctx: &UserContext) -> Result<Filter, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    Insert,
    Update,
    Upsert,
    Delete,
}

/// May change the operation (e.g. rewrite `delete` into a soft-delete
/// `update`) or mutate the data map (spec.md §4.7 item 2).
pub trait MutationTransformer: Send + Sync {
    fn transform(
        &self,
        op: MutationOp,
        data: std::collections::HashMap<String, crate::query_tree::FilterValue>,
        table: &str,
        ctx: &UserContext,
    ) -> Result<(MutationOp, std::collections::HashMap<String, crate::query_tree::FilterValue>), EngineError>;
}

/// Registry of module extensions. Immutable after construction (spec.md §5:
/// "module registries... are immutable after initialization").
#[derive(Default)]
pub struct Pipeline {
    filter_transformers: Vec<Box<dyn FilterTransformer>>,
    mutation_transformers: Vec<Box<dyn MutationTransformer>>,
    observers: Vec<Box<dyn QueryObserver>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Applies every registered filter transformer, in increasing priority
    /// order, to every TableQuery in the tree (root, every join child, and
    /// every pending link navigation — link navigations are not resolved
    /// into joins until `compiler::resolve_links` runs, after the pipeline,
    /// so they still have to be walked here as `PendingLink`s or a tenant/
    /// soft-delete transformer would silently skip anything reached only
    /// through a link field). Idempotent: transformers are expected to
    /// AND-compose via [`Filter::and_with`], which itself flattens rather
    /// than re-nests, so a second pass over an already-transformed tree
    /// yields an equal filter (spec.md §4.7, §8 property 5).
    pub fn apply_filters(&self, query: &mut TableQuery, ctx: &UserContext) -> Result<(), EngineError> {
        let mut ordered: Vec<&Box<dyn FilterTransformer>> = self.filter_transformers.iter().collect();
        ordered.sort_by_key(|t| t.priority());

        for transformer in ordered {
            let current = query.filter.take();
            query.filter = Some(transformer.transform(&query.table, current, ctx)?);
        }
        for join in &mut query.joins {
            self.apply_filters(&mut join.child, ctx)?;
        }
        for link in &mut query.links {
            self.apply_filters(&mut link.child, ctx)?;
        }
        Ok(())
    }

    pub fn apply_mutation(
        &self,
        op: MutationOp,
        data: std::collections::HashMap<String, crate::query_tree::FilterValue>,
        table: &str,
        ctx: &UserContext,
    ) -> Result<(MutationOp, std::collections::HashMap<String, crate::query_tree::FilterValue>), EngineError> {
        let mut current_op = op;
        let mut current_data = data;
        for transformer in &self.mutation_transformers {
            let (next_op, next_data) = transformer.transform(current_op, current_data, table, ctx)?;
            current_op = next_op;
            current_data = next_data;
        }
        Ok((current_op, current_data))
    }

    /// Notifies every observer; a throwing observer is caught, logged, and
    /// never propagated (spec.md §4.7 item 3, §8 property 6).
    pub fn notify(&self, phase: ObserverPhase, query: &TableQuery, ctx: &UserContext) {
        for observer in &self.observers {
            if let Err(e) = observer.on_phase(phase, query, ctx) {
                tracing::warn!(phase = ?phase, error = %e, "observer error swallowed");
            }
        }
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    filter_transformers: Vec<Box<dyn FilterTransformer>>,
    mutation_transformers: Vec<Box<dyn MutationTransformer>>,
    observers: Vec<Box<dyn QueryObserver>>,
}

impl PipelineBuilder {
    pub fn filter_transformer(mut self, t: Box<dyn FilterTransformer>) -> Self {
        self.filter_transformers.push(t);
        self
    }

    pub fn mutation_transformer(mut self, t: Box<dyn MutationTransformer>) -> Self {
        self.mutation_transformers.push(t);
        self
    }

    pub fn observer(mut self, o: Box<dyn QueryObserver>) -> Self {
        self.observers.push(o);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            filter_transformers: self.filter_transformers,
            mutation_transformers: self.mutation_transformers,
            observers: self.observers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_tree::{FilterOp, FilterValue};

    struct TenantFilter;
    impl FilterTransformer for TenantFilter {
        fn priority(&self) -> i32 {
            10
        }
        fn transform(&self, _table: &str, current: Option<Filter>, ctx: &UserContext) -> Result<Filter, EngineError> {
            let tenant = ctx.get("tenant_id").ok_or_else(|| EngineError::UserVisible("missing tenant".into()))?;
            let tenant_filter = Filter::leaf("tenant_id", FilterOp::Eq, FilterValue::Int(tenant.parse().unwrap()));
            Ok(match current {
                Some(existing) => existing.and_with(tenant_filter),
                None => tenant_filter,
            })
        }
    }

    #[test]
    fn scenario_f_tenant_transformer() {
        let pipeline = Pipeline::builder().filter_transformer(Box::new(TenantFilter)).build();
        let mut ctx = UserContext::default();
        ctx.claims.insert("tenant_id".into(), "42".into());

        let mut q = TableQuery::new("orders");
        q.columns = vec!["id".into()];
        pipeline.apply_filters(&mut q, &ctx).unwrap();

        assert_eq!(q.filter, Some(Filter::leaf("tenant_id", FilterOp::Eq, FilterValue::Int(42))));
    }

    #[test]
    fn scenario_f_missing_tenant_aborts() {
        let pipeline = Pipeline::builder().filter_transformer(Box::new(TenantFilter)).build();
        let ctx = UserContext::default();
        let mut q = TableQuery::new("orders");
        let err = pipeline.apply_filters(&mut q, &ctx).unwrap_err();
        assert!(matches!(err, EngineError::UserVisible(_)));
    }

    #[test]
    fn repeated_application_stays_a_flat_and() {
        // A transformer that always ANDs in its clause (rather than checking a
        // marker) relies on `Filter::and_with` to keep re-application from ever
        // deepening the tree beyond one AND level.
        let pipeline = Pipeline::builder().filter_transformer(Box::new(TenantFilter)).build();
        let mut ctx = UserContext::default();
        ctx.claims.insert("tenant_id".into(), "42".into());

        let mut q = TableQuery::new("orders");
        pipeline.apply_filters(&mut q, &ctx).unwrap();
        pipeline.apply_filters(&mut q, &ctx).unwrap();

        match q.filter.unwrap() {
            Filter::And(children) => assert_eq!(children.len(), 2),
            other => panic!("expected a flat And, got {other:?}"),
        }
    }

    #[test]
    fn filters_reach_pending_link_navigations_not_just_joins() {
        // { sessions { id workshop { id } } } — `workshop` is still a
        // `PendingLink` at pipeline time (it isn't resolved into a `Join`
        // until the compiler runs), so a tenant/soft-delete transformer must
        // still see it or the link target escapes isolation entirely.
        use crate::query_tree::PendingLink;

        let pipeline = Pipeline::builder().filter_transformer(Box::new(TenantFilter)).build();
        let mut ctx = UserContext::default();
        ctx.claims.insert("tenant_id".into(), "42".into());

        let mut q = TableQuery::new("sessions");
        q.columns = vec!["id".into()];
        let mut linked = TableQuery::new("workshops");
        linked.columns = vec!["id".into()];
        q.links.push(PendingLink { field_name: "workshop".into(), alias: None, child: Box::new(linked) });

        pipeline.apply_filters(&mut q, &ctx).unwrap();

        assert_eq!(q.filter, Some(Filter::leaf("tenant_id", FilterOp::Eq, FilterValue::Int(42))));
        assert_eq!(q.links[0].child.filter, Some(Filter::leaf("tenant_id", FilterOp::Eq, FilterValue::Int(42))));
    }
}
