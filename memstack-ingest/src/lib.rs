//! # memstack-ingest — episode ingestion orchestration
//!
//! [`EpisodeIngester`] is the write path into the knowledge graph
//! (spec.md §4.7): `add_episode` persists and enqueues, `process_episode`
//! runs extraction and persists the results, `remove_episode` tears an
//! episode's contribution back out, and `search` hands off to
//! `memstack-search`.

#![deny(missing_docs)]

mod dimension_cache;
mod ingester;

pub use dimension_cache::DimensionCache;
pub use ingester::{EpisodeIngester, IngestConfig};
