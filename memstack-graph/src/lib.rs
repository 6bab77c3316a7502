#![deny(missing_docs)]
//! Typed Neo4j-backed [`GraphBackend`](memstack_core::traits::GraphBackend)
//! implementation (spec.md §4.3).
//!
//! Grounded on `layer0::StateStore`'s shape (a narrow, validated async
//! store boundary) generalized from key-value to labeled property-graph
//! operations, with identifier validation enforced before any query
//! string is built (`neuron-hook-security`'s pattern-allowlist style).

mod config;
mod identifier;
mod index;
mod query_builder;
mod schema;
mod store;

pub use config::GraphConfig;
pub use identifier::validate_identifier;
pub use query_builder::CypherBuilder;
pub use schema::{SchemaStore, SchemaStoreConfig};
pub use store::Neo4jGraphStore;
