//! # memstack-search — hybrid vector + keyword search
//!
//! Combines Neo4j vector and fulltext indices behind
//! [`memstack_core::traits::GraphBackend`], fuses them with Reciprocal
//! Rank Fusion, and optionally re-ranks with temporal decay and MMR
//! diversity (spec.md §4.5).

#![deny(missing_docs)]

mod engine;
mod escape;
mod mmr;
mod query_expansion;
mod result;
mod rrf;
mod temporal_decay;

pub use engine::{HybridSearchEngine, SearchConfig, SearchOutcome};
pub use result::{ResultKind, SearchResultItem};
