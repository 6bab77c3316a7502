//! # memstack-core — protocol traits and domain model for MemStack
//!
//! This crate defines the shared vocabulary every other MemStack crate
//! builds on:
//!
//! | Concern | Types |
//! |---|---|
//! | Knowledge model | [`model::episode`], [`model::entity`], [`model::community`], [`model::schema`] |
//! | HITL protocol | [`model::hitl`] |
//! | Session/processor state | [`model::processor`] |
//! | Distributed-transaction bookkeeping | [`model::txlog`] |
//! | External collaborators | [`traits`] (graph, relational, cache, embedder, LLM, event bus, queue, clock) |
//! | Error taxonomy | [`error`] |
//! | Scoping | [`scoping`] |
//! | Virtual skill paths | [`skill_path`] |
//! | Configuration | [`config`] |
//!
//! Every protocol trait here is operation-defined: `GraphBackend::save_node`
//! means "persist this node," not "run this Cypher string." Swapping Neo4j
//! for an in-memory fake, or Postgres for SQLite, never touches a caller.

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod model;
pub mod scoping;
pub mod skill_path;
pub mod traits;

#[cfg(feature = "test-utils")]
pub mod test_support;

pub use config::MemstackConfig;
pub use error::{
    CommunityError, CryptoError, ExtractionError, GraphError, HitlError, IngestError,
    SearchError, SessionError, SubstrateError, TxError,
};
pub use scoping::Scoping;
pub use traits::{
    CacheClient, Clock, Embedder, EventBus, GraphBackend, Llm, ProcessEpisodeTask,
    RelationalStore, TaskQueue,
};
