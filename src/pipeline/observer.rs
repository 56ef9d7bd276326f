//! Query observers: side-effect only, notified at four phases, never able to
//! abort a request (spec.md §4.7 item 3).

use crate::error::EngineError;
use crate::query_tree::TableQuery;

use super::UserContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverPhase {
    Parsed,
    Transformed,
    BeforeExecute,
    AfterExecute,
}

pub trait QueryObserver: Send + Sync {
    fn on_phase(&self, phase: ObserverPhase, query: &TableQuery, ctx: &UserContext) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;

    struct ThrowingObserver;
    impl QueryObserver for ThrowingObserver {
        fn on_phase(&self, _phase: ObserverPhase, _query: &TableQuery, _ctx: &UserContext) -> Result<(), EngineError> {
            Err(EngineError::Observer("boom".into()))
        }
    }

    #[test]
    fn throwing_observer_never_aborts() {
        let pipeline = Pipeline::builder().observer(Box::new(ThrowingObserver)).build();
        let ctx = UserContext::default();
        let q = TableQuery::new("orders");
        // notify() returns nothing to propagate; a panic here would fail the test.
        pipeline.notify(ObserverPhase::Parsed, &q, &ctx);
    }
}
