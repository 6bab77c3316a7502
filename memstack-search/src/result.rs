//! [`SearchResultItem`] — one fused search hit, entity or episode.

use serde_json::Value;
use std::collections::HashMap;

/// Which kind of node a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// An entity node.
    Entity,
    /// An episode node.
    Episode,
}

/// One search result, fused across sub-searches and re-ranked.
#[derive(Debug, Clone)]
pub struct SearchResultItem {
    /// Entity or episode.
    pub kind: ResultKind,
    /// Node uuid, as a string (Neo4j property, not parsed back to `Uuid`
    /// here — callers that need the typed id parse it themselves).
    pub uuid: String,
    /// Entity name, or episode name, if present.
    pub name: Option<String>,
    /// Episode content (episodes only).
    pub content: Option<String>,
    /// Entity summary (entities only).
    pub summary: Option<String>,
    /// Current fused/re-ranked score. Higher is more relevant.
    pub score: f64,
    /// Free-form metadata: `entity_type`, `search_type`, `created_at`,
    /// `rrf_score`, accumulated across the pipeline stages.
    pub metadata: HashMap<String, Value>,
}

impl SearchResultItem {
    /// The text MMR/query-expansion should treat as this item's content:
    /// episode content, falling back to summary, falling back to name.
    pub fn comparison_text(&self) -> &str {
        self.content
            .as_deref()
            .or(self.summary.as_deref())
            .or(self.name.as_deref())
            .unwrap_or("")
    }
}
