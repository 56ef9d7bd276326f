//! `PathCache`: endpoint path -> (DbModel, GraphQL schema), with
//! single-writer-on-miss semantics (spec.md §5: "at most one loader per
//! path; other requests block on the same future").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::db::Pool;
use crate::error::EngineError;
use crate::gql_schema::GqlSchema;
use crate::model::DbModel;
use crate::pipeline::Pipeline;

/// Everything a request needs once the catalog has been read and the
/// GraphQL schema derived from it: the immutable model snapshot, the
/// dynamic schema built over it, and the pool/dialect/pipeline it was built
/// against.
#[derive(Clone)]
pub struct CacheEntry {
    pub model: Arc<DbModel>,
    pub schema: GqlSchema,
    pub built_at: Instant,
    pub build_duration: Duration,
}

type Slot = Arc<OnceCell<Result<CacheEntry, String>>>;

/// Concurrent map from endpoint path to its cache slot. Cloning a `PathCache`
/// shares the same underlying map (it's an `Arc` internally via the `Mutex`
/// + per-entry `OnceCell`), so one instance can be stashed in application
/// state and cloned into every request handler.
#[derive(Clone, Default)]
pub struct PathCache {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry for `path`, building it with `loader` on a
    /// miss. Concurrent callers for the same path share one in-flight build:
    /// the first caller to reach an empty slot inserts a fresh `OnceCell` and
    /// runs `loader`; every other caller (including ones that arrive while
    /// the build is in flight) awaits that same cell.
    pub async fn get_or_build<F, Fut>(&self, path: &str, loader: F) -> Result<CacheEntry, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(Arc<DbModel>, GqlSchema), EngineError>>,
    {
        let slot = {
            let mut slots = self.slots.lock();
            slots.entry(path.to_string()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let result = slot
            .get_or_init(|| async move {
                let started = Instant::now();
                match loader().await {
                    Ok((model, schema)) => {
                        let build_duration = started.elapsed();
                        tracing::info!(
                            tables = model.tables.len(),
                            build_ms = build_duration.as_millis(),
                            "db model + gql schema built"
                        );
                        Ok(CacheEntry { model, schema, built_at: started, build_duration })
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "schema load failed");
                        Err(e.to_string())
                    }
                }
            })
            .await;

        result.clone().map_err(|msg| EngineError::SchemaRead(anyhow::anyhow!(msg)))
    }

    /// Forces a rebuild on the next `get_or_build` call for `path` (manual
    /// refresh; spec.md §3 "rebuilt on explicit refresh"). In-flight requests
    /// that already hold the old entry keep using it until they complete
    /// (spec.md §5: "old snapshot remains valid for in-flight requests").
    pub fn invalidate(&self, path: &str) {
        self.slots.lock().remove(path);
    }

    pub fn paths(&self) -> Vec<String> {
        self.slots.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_misses_load_once() {
        let cache = PathCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_build("/graphql", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Err::<(Arc<DbModel>, GqlSchema), EngineError>(EngineError::SchemaRead(
                            anyhow::anyhow!("unbuildable in this unit test"),
                        ))
                    })
                    .await
            }));
        }
        for h in handles {
            let _ = h.await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidate_clears_only_named_path() {
        let cache = PathCache::new();
        cache.slots.lock().insert("/a".into(), Arc::new(OnceCell::new()));
        cache.slots.lock().insert("/b".into(), Arc::new(OnceCell::new()));
        cache.invalidate("/a");
        let remaining = cache.paths();
        assert_eq!(remaining, vec!["/b".to_string()]);
    }
}
