#![deny(missing_docs)]
//! # memstack — umbrella crate
//!
//! Single import surface for the MemStack agent-memory backend: the
//! session processor and HITL pause/resume machinery, the knowledge-graph
//! pipeline, the distributed transaction coordinator, and the shared
//! data-access substrate they all depend on (spec.md §1, §2). Re-exports
//! every component crate behind a feature flag, plus a [`prelude`] for
//! the happy path.

#[cfg(feature = "core")]
pub use memstack_core;
#[cfg(feature = "community")]
pub use memstack_community;
#[cfg(feature = "crypto")]
pub use memstack_crypto;
#[cfg(feature = "extraction")]
pub use memstack_extraction;
#[cfg(feature = "graph")]
pub use memstack_graph;
#[cfg(feature = "hitl")]
pub use memstack_hitl;
#[cfg(feature = "ingest")]
pub use memstack_ingest;
#[cfg(feature = "search")]
pub use memstack_search;
#[cfg(feature = "session")]
pub use memstack_session;
#[cfg(feature = "substrate")]
pub use memstack_substrate;
#[cfg(feature = "tx")]
pub use memstack_tx;

/// Happy-path imports for composing a MemStack deployment.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use memstack_core::{
        Scoping,
        model::{Episode, EntityEdge, EntityNode, HitlRequest, HitlResponse, SchemaContext},
        traits::{
            CacheClient, Clock, Embedder, EventBus, GraphBackend, Llm, RelationalStore, TaskQueue,
        },
    };

    #[cfg(feature = "substrate")]
    pub use memstack_substrate::{
        CircuitBreaker, CircuitBreakerRegistry, QueryMonitor, SystemHealthChecker,
        retry_with_backoff,
    };

    #[cfg(feature = "tx")]
    pub use memstack_tx::TxCoordinator;

    #[cfg(feature = "graph")]
    pub use memstack_graph::{Neo4jGraphStore, SchemaStore};

    #[cfg(feature = "extraction")]
    pub use memstack_extraction::ExtractionPipeline;

    #[cfg(feature = "search")]
    pub use memstack_search::HybridSearchEngine;

    #[cfg(feature = "community")]
    pub use memstack_community::CommunityEngine;

    #[cfg(feature = "ingest")]
    pub use memstack_ingest::EpisodeIngester;

    #[cfg(feature = "hitl")]
    pub use memstack_hitl::{HitlHandler, HitlRegistry};

    #[cfg(feature = "session")]
    pub use memstack_session::SessionProcessor;
}
