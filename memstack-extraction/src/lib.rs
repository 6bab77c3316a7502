//! # memstack-extraction — entity/relationship extraction and deduplication
//!
//! Turns raw episode content into a validated, deduplicated entity and
//! relationship set: an LLM-driven extraction pass, optional reflexion,
//! exclusion filtering, exact-duplicate detection, and schema-constrained
//! relationship extraction (spec.md §4.4).

#![deny(missing_docs)]

mod candidate;
mod dedup;
mod pipeline;
mod prompts;

pub use dedup::HashDeduplicator;
pub use pipeline::{ExtractionConfig, ExtractionPipeline};
