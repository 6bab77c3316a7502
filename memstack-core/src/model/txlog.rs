//! [`CompensatingTransaction`] — the reconciliation record for a partially
//! committed distributed transaction (spec.md §3, §4.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a compensating-transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensatingTransactionStatus {
    /// Awaiting reconciliation.
    Pending,
    /// Successfully replayed and resolved.
    Reconciled,
    /// Replay was attempted and failed.
    Failed,
}

/// A replay payload for the graph side of a failed commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphReplay {
    /// The Cypher query that failed to commit.
    pub query: String,
    /// Bound parameters for that query.
    pub params: serde_json::Value,
}

/// A replay payload for the cache side of a failed commit. Cache entries
/// are never actually replayed (spec.md §4.2 "Reconcile") — this is kept
/// for completeness/audit, not acted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheReplay {
    /// The cache command that failed (e.g. `SET`).
    pub command: String,
    /// Command arguments.
    pub args: Vec<String>,
}

/// An inconsistency record written whenever the authoritative SQL commit
/// succeeded but a dependent store's commit did not (spec.md §3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensatingTransaction {
    /// Unique identifier.
    pub id: Uuid,
    /// The entity the transaction concerned.
    pub entity_id: String,
    /// Name of the logical operation (e.g. "save_entity_edge").
    pub operation: String,
    /// Whether the SQL commit succeeded.
    pub postgres_committed: bool,
    /// Whether the graph commit succeeded.
    pub neo4j_committed: bool,
    /// Whether the cache commit succeeded.
    pub redis_committed: bool,
    /// Graph replay payload, present when `neo4j_committed == false`.
    pub graph_replay: Option<GraphReplay>,
    /// Cache replay payload, present when `redis_committed == false`.
    pub cache_replay: Option<CacheReplay>,
    /// Current status.
    pub status: CompensatingTransactionStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl CompensatingTransaction {
    /// Construct a new pending compensating record.
    pub fn new(
        entity_id: impl Into<String>,
        operation: impl Into<String>,
        postgres_committed: bool,
        neo4j_committed: bool,
        redis_committed: bool,
        graph_replay: Option<GraphReplay>,
        cache_replay: Option<CacheReplay>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id: entity_id.into(),
            operation: operation.into(),
            postgres_committed,
            neo4j_committed,
            redis_committed,
            graph_replay,
            cache_replay,
            status: CompensatingTransactionStatus::Pending,
            created_at,
        }
    }
}
