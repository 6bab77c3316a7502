//! The [`Episode`] — a unit of ingested content.

use crate::scoping::Scoping;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How an episode's content was originally shaped.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Free-form text.
    Text,
    /// Structured JSON.
    Json,
    /// A document (PDF, markdown, etc. — bytes already extracted to text).
    Document,
    /// Output from an API call.
    Api,
    /// A conversational transcript.
    Conversation,
}

/// Lifecycle status of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    /// Ingested, queued or running through the extraction pipeline.
    Processing,
    /// Extraction completed and entities/edges were persisted.
    Synced,
    /// Extraction raised and the episode did not finish processing.
    Failed,
}

/// A unit of ingested content processed into entities and relationships.
///
/// Immutable after creation except for `status` and `derived_edge_ids`
/// (spec.md §3). Every other field is set once at `add_episode` time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Unique identifier.
    pub id: Uuid,
    /// Raw content text.
    pub content: String,
    /// Structural shape of the content.
    pub source_type: SourceType,
    /// Free-text human label for provenance (e.g. "slack-import"),
    /// distinct from the structural `source_type` — carried in from
    /// `original_source/src/domain/model/memory/episode.py`.
    pub source: Option<String>,
    /// When the content is considered valid/true (may differ from
    /// ingestion time for backfilled data).
    pub valid_at: DateTime<Utc>,
    /// When this episode record was created.
    pub created_at: DateTime<Utc>,
    /// Tenant/project/user scoping.
    pub scoping: Scoping,
    /// Optional human-readable name.
    pub name: Option<String>,
    /// Current lifecycle status.
    pub status: EpisodeStatus,
    /// Arbitrary metadata, including `memory_id` when present.
    pub metadata: serde_json::Value,
    /// Identifiers of entity-edges derived from this episode. Grows as
    /// `process_episode` persists relationships; never shrinks except via
    /// `remove_episode`.
    pub derived_edge_ids: Vec<Uuid>,
}

impl Episode {
    /// Construct a new episode in `Processing` status with no derived
    /// edges yet — the shape `EpisodeIngester::add_episode` produces
    /// before enqueuing async processing.
    pub fn new(
        content: impl Into<String>,
        source_type: SourceType,
        scoping: Scoping,
        valid_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            source_type,
            source: None,
            valid_at,
            created_at,
            scoping,
            name: None,
            status: EpisodeStatus::Processing,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            derived_edge_ids: Vec::new(),
        }
    }

    /// The `memory_id` tucked into metadata, if any.
    pub fn memory_id(&self) -> Option<&str> {
        self.metadata.get("memory_id").and_then(|v| v.as_str())
    }
}
