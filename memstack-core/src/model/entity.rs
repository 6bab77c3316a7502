//! [`EntityNode`] and [`EntityEdge`] — the knowledge graph's vertices and edges.

use crate::scoping::Scoping;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A conceptual entity discovered in episodes.
///
/// Owned by the graph; referenced by zero-to-many episodes via `MENTIONS`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityNode {
    /// Unique identifier.
    pub id: Uuid,
    /// Entity name as extracted (or merged) from content.
    pub name: String,
    /// Name of the entity type (from the project's `SchemaContext`).
    pub entity_type: String,
    /// Optional free-text summary.
    pub summary: Option<String>,
    /// Name embedding, if one has been computed. The vector's length is
    /// the dimension recorded on this node for dimension-mismatch
    /// detection (spec.md §4.7).
    pub name_embedding: Option<Vec<f32>>,
    /// JSON-serialized free-form attributes extracted alongside the name.
    pub attributes: serde_json::Value,
    /// Tenant/project/user scoping.
    pub scoping: Scoping,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl EntityNode {
    /// Construct a new entity node with no embedding yet.
    pub fn new(
        name: impl Into<String>,
        entity_type: impl Into<String>,
        scoping: Scoping,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            entity_type: entity_type.into(),
            summary: None,
            name_embedding: None,
            attributes: serde_json::Value::Object(serde_json::Map::new()),
            scoping,
            created_at,
        }
    }

    /// Dimension of the recorded embedding, if any.
    pub fn embedding_dimension(&self) -> Option<usize> {
        self.name_embedding.as_ref().map(|v| v.len())
    }

    /// Remove the stale embedding (used when the embedder's dimension no
    /// longer matches, spec.md §4.7 step 1, and on episode removal to
    /// avoid stale vectors across provider switches, spec.md §4.7
    /// `remove_episode`).
    pub fn clear_embedding(&mut self) {
        self.name_embedding = None;
    }
}

/// Error returned when an [`EntityEdge`] is constructed with an
/// out-of-range weight.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("edge weight {0} is outside [0,1]")]
pub struct WeightOutOfRange(pub f64);

/// A typed directed relationship between two entities.
///
/// Invariant: `weight ∈ [0,1]`, enforced at construction — there is no way
/// to build an `EntityEdge` with an invalid weight outside this module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEdge {
    /// Unique identifier.
    pub id: Uuid,
    /// Source entity id.
    pub source_id: Uuid,
    /// Target entity id.
    pub target_id: Uuid,
    /// Relationship-type identifier (validated as a graph identifier by
    /// `memstack-graph` before any query interpolation).
    pub relationship_type: String,
    /// Free-text summary of the relationship.
    pub summary: String,
    weight: f64,
    /// Episode ids that contributed evidence for this edge. An edge with
    /// an empty list is orphan-eligible (spec.md §3).
    pub contributing_episode_ids: Vec<Uuid>,
}

impl EntityEdge {
    /// Construct a new edge, validating `weight ∈ [0,1]`.
    pub fn new(
        source_id: Uuid,
        target_id: Uuid,
        relationship_type: impl Into<String>,
        summary: impl Into<String>,
        weight: f64,
    ) -> Result<Self, WeightOutOfRange> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(WeightOutOfRange(weight));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            source_id,
            target_id,
            relationship_type: relationship_type.into(),
            summary: summary.into(),
            weight,
            contributing_episode_ids: Vec::new(),
        })
    }

    /// The validated weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Whether this edge has no remaining contributing episodes and is
    /// therefore eligible for cleanup (spec.md §3, §4.7 `remove_episode`).
    pub fn is_orphan_eligible(&self) -> bool {
        self.contributing_episode_ids.is_empty()
    }
}
