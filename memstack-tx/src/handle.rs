//! [`TxHandle`] — the scoped queue of deferred SQL/graph/cache operations.

use futures::future::BoxFuture;
use memstack_core::model::{CacheReplay, GraphReplay};

type BoxedOp<'a> = Box<dyn FnOnce() -> BoxFuture<'a, Result<(), String>> + Send + 'a>;

/// A queued operation awaiting a decision on whether the graph side needs
/// a compensating replay payload recorded for it.
pub(crate) struct GraphOp<'a> {
    pub(crate) op: BoxedOp<'a>,
    pub(crate) replay: GraphReplay,
}

/// A queued cache operation, with the replay payload recorded for audit
/// purposes (never actually replayed, spec.md §4.2 "Reconcile").
pub(crate) struct CacheOp<'a> {
    pub(crate) op: BoxedOp<'a>,
    pub(crate) replay: CacheReplay,
}

/// The handle a transaction scope populates. Operations are queued here,
/// not executed, until [`crate::TxCoordinator`] runs its commit phase —
/// mirrors how `layer0::effect::Effect` values are collected by an
/// operator and only executed by the calling layer.
#[derive(Default)]
pub struct TxHandle<'a> {
    pub(crate) sql_ops: Vec<BoxedOp<'a>>,
    pub(crate) graph_ops: Vec<GraphOp<'a>>,
    pub(crate) cache_ops: Vec<CacheOp<'a>>,
}

impl<'a> TxHandle<'a> {
    /// Create an empty handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a SQL write. Runs first at commit time; if it fails, nothing
    /// else in this transaction runs.
    pub fn execute_sql<F, Fut>(&mut self, op: F)
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: std::future::Future<Output = Result<(), String>> + Send + 'a,
    {
        self.sql_ops.push(Box::new(move || Box::pin(op())));
    }

    /// Queue a graph write, with the Cypher/params that would need to be
    /// replayed if this commit fails after SQL has already committed.
    pub fn execute_graph<F, Fut>(&mut self, replay: GraphReplay, op: F)
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: std::future::Future<Output = Result<(), String>> + Send + 'a,
    {
        self.graph_ops.push(GraphOp {
            op: Box::new(move || Box::pin(op())),
            replay,
        });
    }

    /// Queue a cache write. Cache failures are always swallowed at commit
    /// time (spec.md §4.2, §7 "Cache operations never fail the caller").
    pub fn execute_cache<F, Fut>(&mut self, replay: CacheReplay, op: F)
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: std::future::Future<Output = Result<(), String>> + Send + 'a,
    {
        self.cache_ops.push(CacheOp {
            op: Box::new(move || Box::pin(op())),
            replay,
        });
    }

    /// Whether this handle has no queued operations at all.
    pub fn is_empty(&self) -> bool {
        self.sql_ops.is_empty() && self.graph_ops.is_empty() && self.cache_ops.is_empty()
    }
}
