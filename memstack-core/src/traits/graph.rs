//! [`GraphBackend`] — the typed property-graph store boundary
//! (spec.md §4.3).

use crate::error::GraphError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// A bare graph node as returned by a lookup: labels plus property bag.
#[derive(Debug, Clone)]
pub struct RawNode {
    /// Node labels.
    pub labels: Vec<String>,
    /// Node properties, including `uuid`.
    pub properties: HashMap<String, Value>,
}

/// The typed property-graph store boundary. Implementations (a real Neo4j
/// driver, an in-memory fake for tests) must validate identifiers before
/// any query-string interpolation (spec.md §4.3) — that validation lives
/// in `memstack-graph`, not here, so the trait itself stays a pure I/O
/// boundary like `layer0::StateStore`.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Create or update a node with the given labels, uuid, and
    /// properties.
    async fn save_node(
        &self,
        labels: &[String],
        uuid: Uuid,
        props: HashMap<String, Value>,
    ) -> Result<(), GraphError>;

    /// Create a relationship between two existing nodes.
    async fn save_edge(
        &self,
        from_uuid: Uuid,
        to_uuid: Uuid,
        rel_type: &str,
        props: Option<HashMap<String, Value>>,
    ) -> Result<(), GraphError>;

    /// Delete a node, detaching (deleting) all of its relationships.
    async fn delete_node(&self, uuid: Uuid) -> Result<(), GraphError>;

    /// Find a node by uuid, optionally restricted to a label set.
    async fn find_node_by_uuid(
        &self,
        uuid: Uuid,
        labels: Option<&[String]>,
    ) -> Result<Option<RawNode>, GraphError>;

    /// Run a raw, already-validated Cypher query with bound parameters
    /// under a per-call deadline.
    async fn execute_query(
        &self,
        cypher: &str,
        params: HashMap<String, Value>,
        timeout: Duration,
    ) -> Result<Vec<HashMap<String, Value>>, GraphError>;

    /// Whether the graph backend exposes a graph-data-science library
    /// (spec.md §4.6 "Accelerated path"). Default: no.
    fn supports_graph_data_science(&self) -> bool {
        false
    }
}
