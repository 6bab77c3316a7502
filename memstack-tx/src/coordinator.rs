//! [`TxCoordinator`] — commits a [`TxHandle`]'s queued operations in the
//! fixed SQL → graph → cache order and logs compensating transactions for
//! partial failures (spec.md §4.2).

use crate::handle::TxHandle;
use crate::stats::{LiveStats, TxStats};
use memstack_core::error::TxError;
use memstack_core::model::CompensatingTransaction;
use memstack_core::traits::{Clock, GraphBackend, RelationalStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// What happened to a committed (or attempted) transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// All three stores committed.
    Committed,
    /// SQL committed, but a dependent store did not; a compensating record
    /// was written. Cache-only failures still report this outcome even
    /// though the caller-visible error is swallowed (spec.md §4.2).
    Inconsistent,
}

/// Coordinates a single logical transaction across SQL (authoritative),
/// graph, and cache (spec.md §4.2). Holds no per-transaction state between
/// calls — every `run` is independent.
pub struct TxCoordinator {
    relational: Arc<dyn RelationalStore>,
    graph: Arc<dyn GraphBackend>,
    clock: Arc<dyn Clock>,
    default_timeout: Duration,
    stats: LiveStats,
}

impl TxCoordinator {
    /// Construct a coordinator bound to the three stores it sequences
    /// commits across.
    pub fn new(
        relational: Arc<dyn RelationalStore>,
        graph: Arc<dyn GraphBackend>,
        clock: Arc<dyn Clock>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            relational,
            graph,
            clock,
            default_timeout,
            stats: LiveStats::default(),
        }
    }

    /// Current coordinator statistics (spec.md §4.2 "Statistics").
    pub fn stats(&self) -> TxStats {
        self.stats.snapshot()
    }

    /// Run a transaction scope: `populate` queues operations onto the
    /// handle (synchronously or via `.await`ed setup that can itself
    /// fail), then the coordinator commits the queue SQL → graph → cache.
    ///
    /// `entity_id`/`operation` name the logical write, for the
    /// compensating-transaction record if one is needed.
    pub async fn run<'a, F, Fut>(
        &self,
        entity_id: impl Into<String>,
        operation: impl Into<String>,
        timeout: Option<Duration>,
        populate: F,
    ) -> Result<TxOutcome, TxError>
    where
        F: FnOnce(&mut TxHandle<'a>) -> Fut,
        Fut: std::future::Future<Output = Result<(), TxError>>,
    {
        let entity_id = entity_id.into();
        let operation = operation.into();
        let deadline = timeout.unwrap_or(self.default_timeout);

        let mut handle = TxHandle::new();
        let scope = async {
            populate(&mut handle).await?;
            self.commit(&entity_id, &operation, handle).await
        };

        match tokio::time::timeout(deadline, scope).await {
            Ok(result) => {
                self.stats.record_outcome(&result);
                result
            }
            Err(_) => {
                self.stats.record_timeout();
                tracing::warn!(entity_id, operation, "transaction scope timed out, rolling back");
                Err(TxError::Timeout(deadline.as_millis() as u64))
            }
        }
    }

    async fn commit(
        &self,
        entity_id: &str,
        operation: &str,
        handle: TxHandle<'_>,
    ) -> Result<TxOutcome, TxError> {
        let TxHandle {
            sql_ops,
            graph_ops,
            cache_ops,
        } = handle;

        for op in sql_ops {
            if let Err(e) = op().await {
                self.stats.record_rollback();
                tracing::error!(entity_id, operation, error = %e, "sql commit failed, no compensating record written");
                return Err(TxError::SqlFailed(e));
            }
        }

        let mut graph_error: Option<String> = None;
        let mut graph_replay = None;
        for graph_op in graph_ops {
            if let Err(e) = (graph_op.op)().await {
                graph_error = Some(e);
                graph_replay = Some(graph_op.replay);
                break;
            }
        }
        let neo4j_committed = graph_error.is_none();

        let mut cache_error: Option<String> = None;
        let mut cache_replay = None;
        for cache_op in cache_ops {
            if let Err(e) = (cache_op.op)().await {
                cache_error = Some(e);
                cache_replay = Some(cache_op.replay);
                break;
            }
        }
        let redis_committed = cache_error.is_none();
        if let Some(e) = &cache_error {
            tracing::warn!(entity_id, operation, error = %e, "cache commit failed, swallowed (non-authoritative)");
        }

        if !neo4j_committed || !redis_committed {
            let record = CompensatingTransaction::new(
                entity_id.to_string(),
                operation.to_string(),
                true,
                neo4j_committed,
                redis_committed,
                graph_replay,
                cache_replay,
                self.clock.now(),
            );
            if let Err(e) = self.relational.save_compensating_transaction(&record).await {
                tracing::error!(entity_id, operation, error = %e, "failed to persist compensating transaction record");
            }
            self.stats.record_inconsistency();
        }

        if let Some(e) = graph_error {
            return Err(TxError::GraphFailed(e));
        }

        if redis_committed {
            Ok(TxOutcome::Committed)
        } else {
            Ok(TxOutcome::Inconsistent)
        }
    }

    /// Replay the missing graph operation for a pending compensating
    /// transaction (spec.md §4.2 "Reconcile"). Cache entries are never
    /// replayed — the cache rebuilds lazily on next read.
    pub async fn reconcile(&self, id: Uuid) -> Result<TxOutcome, TxError> {
        let record = self
            .relational
            .get_compensating_transaction(id)
            .await
            .map_err(|e| TxError::Other(Box::new(e)))?
            .ok_or_else(|| TxError::NoSuchCompensation(id.to_string()))?;

        let Some(replay) = &record.graph_replay else {
            // Nothing to replay (cache-only inconsistency); mark reconciled.
            self.mark_reconciled(id).await?;
            return Ok(TxOutcome::Committed);
        };

        let params: HashMap<String, serde_json::Value> = match &replay.params {
            serde_json::Value::Object(map) => {
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            _ => HashMap::new(),
        };

        match self
            .graph
            .execute_query(&replay.query, params, Duration::from_secs(30))
            .await
        {
            Ok(_) => {
                self.mark_reconciled(id).await?;
                self.stats.record_reconciled();
                Ok(TxOutcome::Committed)
            }
            Err(e) => {
                self.relational
                    .update_compensating_transaction_status(
                        id,
                        memstack_core::model::CompensatingTransactionStatus::Failed,
                    )
                    .await
                    .map_err(|e| TxError::Other(Box::new(e)))?;
                Err(TxError::GraphFailed(e.to_string()))
            }
        }
    }

    async fn mark_reconciled(&self, id: Uuid) -> Result<(), TxError> {
        self.relational
            .update_compensating_transaction_status(
                id,
                memstack_core::model::CompensatingTransactionStatus::Reconciled,
            )
            .await
            .map_err(|e| TxError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstack_core::model::{CacheReplay, GraphReplay};
    use memstack_core::test_support::{FakeClock, FakeGraphBackend, FakeRelationalStore};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn coordinator() -> (TxCoordinator, Arc<FakeRelationalStore>, Arc<FakeGraphBackend>) {
        let relational = Arc::new(FakeRelationalStore::new());
        let graph = Arc::new(FakeGraphBackend::new());
        let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
        let coordinator = TxCoordinator::new(
            relational.clone(),
            graph.clone(),
            clock,
            Duration::from_secs(5),
        );
        (coordinator, relational, graph)
    }

    #[tokio::test]
    async fn happy_path_commits_all_three_stores() {
        let (coordinator, _relational, _graph) = coordinator();
        let sql_ran = Arc::new(AtomicBool::new(false));
        let graph_ran = Arc::new(AtomicBool::new(false));
        let cache_ran = Arc::new(AtomicBool::new(false));

        let (s, g, c) = (sql_ran.clone(), graph_ran.clone(), cache_ran.clone());
        let outcome = coordinator
            .run("entity-1", "save_entity", None, move |tx| {
                let (s, g, c) = (s, g, c);
                async move {
                    tx.execute_sql(move || async move {
                        s.store(true, Ordering::SeqCst);
                        Ok(())
                    });
                    tx.execute_graph(
                        GraphReplay {
                            query: "MERGE (n)".into(),
                            params: serde_json::json!({}),
                        },
                        move || async move {
                            g.store(true, Ordering::SeqCst);
                            Ok(())
                        },
                    );
                    tx.execute_cache(
                        CacheReplay {
                            command: "SET".into(),
                            args: vec!["key".into()],
                        },
                        move || async move {
                            c.store(true, Ordering::SeqCst);
                            Ok(())
                        },
                    );
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(outcome, TxOutcome::Committed);
        assert!(sql_ran.load(Ordering::SeqCst));
        assert!(graph_ran.load(Ordering::SeqCst));
        assert!(cache_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn sql_failure_never_runs_graph_or_cache_and_writes_no_record() {
        let (coordinator, relational, _graph) = coordinator();
        let graph_ran = Arc::new(AtomicBool::new(false));
        let g = graph_ran.clone();

        let result = coordinator
            .run("entity-2", "save_entity", None, move |tx| {
                let g = g.clone();
                async move {
                    tx.execute_sql(|| async { Err("connection refused".to_string()) });
                    tx.execute_graph(
                        GraphReplay {
                            query: "MERGE (n)".into(),
                            params: serde_json::json!({}),
                        },
                        move || async move {
                            g.store(true, Ordering::SeqCst);
                            Ok(())
                        },
                    );
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(TxError::SqlFailed(_))));
        assert!(!graph_ran.load(Ordering::SeqCst));
        assert!(
            relational
                .list_pending_compensating_transactions()
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn sql_succeeds_graph_fails_writes_compensating_record_and_surfaces_graph_error() {
        let (coordinator, relational, _graph) = coordinator();

        let result = coordinator
            .run("entity-3", "save_entity_edge", None, |tx| async move {
                tx.execute_sql(|| async { Ok(()) });
                tx.execute_graph(
                    GraphReplay {
                        query: "MERGE (a)-[:KNOWS]->(b)".into(),
                        params: serde_json::json!({"a": "1"}),
                    },
                    || async { Err("neo4j unavailable".to_string()) },
                );
                tx.execute_cache(
                    CacheReplay {
                        command: "SET".into(),
                        args: vec!["entity:3".into()],
                    },
                    || async { Ok(()) },
                );
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(TxError::GraphFailed(_))));
        let pending = relational
            .list_pending_compensating_transactions()
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        let record = &pending[0];
        assert!(record.postgres_committed);
        assert!(!record.neo4j_committed);
        assert!(record.redis_committed);
        assert_eq!(
            record.graph_replay.as_ref().unwrap().query,
            "MERGE (a)-[:KNOWS]->(b)"
        );
    }

    #[tokio::test]
    async fn sql_and_graph_succeed_cache_fails_swallows_error_but_logs_compensation() {
        let (coordinator, relational, _graph) = coordinator();

        let outcome = coordinator
            .run("entity-4", "save_entity", None, |tx| async move {
                tx.execute_sql(|| async { Ok(()) });
                tx.execute_graph(
                    GraphReplay {
                        query: "MERGE (n)".into(),
                        params: serde_json::json!({}),
                    },
                    || async { Ok(()) },
                );
                tx.execute_cache(
                    CacheReplay {
                        command: "SET".into(),
                        args: vec!["k".into()],
                    },
                    || async { Err("redis timeout".to_string()) },
                );
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(outcome, TxOutcome::Inconsistent);
        let pending = relational
            .list_pending_compensating_transactions()
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].neo4j_committed);
        assert!(!pending[0].redis_committed);
    }
}
