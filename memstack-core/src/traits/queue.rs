//! [`TaskQueue`] — the async episode-processing boundary (spec.md §4.7).

use crate::scoping::Scoping;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A queued request to extract entities/relationships from an episode's
/// content (spec.md §4.7 "Episode processing is queued, not inline").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEpisodeTask {
    /// The episode to process.
    pub episode_uuid: Uuid,
    /// The episode content to extract from.
    pub content: String,
    /// Tenant/project/user scoping for the extraction.
    pub scoping: Scoping,
    /// Entity type names to exclude from extraction, if any.
    pub excluded_types: Option<Vec<String>>,
}

/// Errors from enqueuing a task.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum TaskQueueError {
    /// The queue backend rejected or failed to accept the task.
    #[error("failed to enqueue task: {0}")]
    EnqueueFailed(String),
}

/// Hands episode-processing work to an async worker, decoupled from the
/// request path that created the episode.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue an episode for processing.
    async fn enqueue(&self, task: ProcessEpisodeTask) -> Result<(), TaskQueueError>;
}
