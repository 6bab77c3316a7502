//! # memstack-community — Louvain community detection
//!
//! Clusters a project's entity graph into communities, summarizes each
//! with an [`memstack_core::traits::Llm`], and persists them as
//! `Community` nodes with `BELONGS_TO` edges (spec.md §4.6). Runs either
//! natively over `petgraph` or delegates to Neo4j's Graph Data Science
//! library, chosen per call by
//! [`memstack_core::traits::GraphBackend::supports_graph_data_science`].

#![deny(missing_docs)]

mod accelerator;
mod engine;
mod louvain;

pub use accelerator::{GdsAccelerator, GraphAlgoAccelerator, NativeAccelerator};
pub use engine::{CommunityEngine, DEFAULT_MIN_COMMUNITY_SIZE};
pub use louvain::detect_communities;
