//! [`HybridSearchEngine`] — orchestrates vector + keyword sub-searches,
//! RRF fusion, temporal decay, and MMR re-ranking (spec.md §4.5).

use crate::escape::escape_fulltext_query;
use crate::mmr::mmr_rerank;
use crate::query_expansion::expand_query;
use crate::result::{ResultKind, SearchResultItem};
use crate::rrf::rrf_fuse;
use crate::temporal_decay::apply_temporal_decay;
use chrono::{DateTime, Utc};
use memstack_core::error::SearchError;
use memstack_core::traits::{Embedder, GraphBackend};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Tunables for one engine instance, mirroring
/// `MemstackConfig`'s search-related fields plus the index names a
/// deployment chooses at bootstrap time (spec.md §4.3 "Indices").
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// RRF fusion constant.
    pub rrf_k: u32,
    /// Weight given to the vector sub-search in RRF fusion.
    pub vector_weight: f64,
    /// Weight given to the keyword sub-search in RRF fusion.
    pub keyword_weight: f64,
    /// Whether MMR diversity re-ranking runs after fusion.
    pub mmr_enabled: bool,
    /// MMR relevance/diversity trade-off.
    pub mmr_lambda: f64,
    /// Whether temporal decay runs after fusion.
    pub temporal_decay_enabled: bool,
    /// Half-life, in days, for temporal decay.
    pub temporal_half_life_days: f64,
    /// Whether stopword-based query expansion runs before fulltext search.
    pub query_expansion_enabled: bool,
    /// Base name of the entity vector index (a `{name}_{dim}D` variant is
    /// tried first).
    pub vector_index_name: String,
    /// Fulltext index over entity name + summary.
    pub fulltext_index_entities: String,
    /// Fulltext index over episode content.
    pub fulltext_index_episodes: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60,
            vector_weight: 0.6,
            keyword_weight: 0.4,
            mmr_enabled: false,
            mmr_lambda: 0.7,
            temporal_decay_enabled: false,
            temporal_half_life_days: 30.0,
            query_expansion_enabled: false,
            vector_index_name: "entity_name_vector".to_string(),
            fulltext_index_entities: "entity_name_summary_fulltext".to_string(),
            fulltext_index_episodes: "episode_content_fulltext".to_string(),
        }
    }
}

/// The result of a full hybrid search: the limited, re-ranked items plus
/// bookkeeping about how many candidates each stage produced.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Final, limited, re-ranked result set.
    pub items: Vec<SearchResultItem>,
    /// Count of fused results before the `limit` truncation.
    pub total_results: usize,
    /// How many vector-search entity candidates were found.
    pub vector_results_count: usize,
    /// How many keyword-search candidates (entities + episodes) were
    /// found.
    pub keyword_results_count: usize,
}

/// Combines a graph backend and an embedder into the hybrid search
/// pipeline spec.md §4.5 describes.
pub struct HybridSearchEngine {
    graph: Arc<dyn GraphBackend>,
    embedder: Arc<dyn Embedder>,
    config: SearchConfig,
}

impl HybridSearchEngine {
    /// Build an engine over the given graph backend and embedder.
    pub fn new(graph: Arc<dyn GraphBackend>, embedder: Arc<dyn Embedder>, config: SearchConfig) -> Self {
        Self {
            graph,
            embedder,
            config,
        }
    }

    /// Run the full hybrid search pipeline. Never fails outright: if a
    /// sub-search errors it contributes an empty result set instead
    /// (spec.md §4.5 "must never raise if at least one sub-search
    /// succeeds"), so [`SearchError::AllSubsearchesFailed`] only surfaces
    /// when every requested sub-search comes back empty.
    pub async fn search(
        &self,
        query: &str,
        project_id: Option<&str>,
        limit: usize,
        include_episodes: bool,
        include_entities: bool,
    ) -> Result<SearchOutcome, SearchError> {
        if query.trim().is_empty() {
            return Ok(SearchOutcome::default());
        }

        let fetch_limit = if self.config.mmr_enabled { limit * 3 } else { limit * 2 };
        let expanded_query = if self.config.query_expansion_enabled {
            expand_query(query)
        } else {
            query.to_string()
        };

        let vector_fut = async {
            if include_entities {
                self.vector_search_entities(query, project_id, fetch_limit).await
            } else {
                Vec::new()
            }
        };
        let keyword_entity_fut = async {
            if include_entities {
                self.keyword_search_entities(&expanded_query, project_id, fetch_limit).await
            } else {
                Vec::new()
            }
        };
        let episode_fut = async {
            if include_episodes {
                self.keyword_search_episodes(&expanded_query, project_id, fetch_limit).await
            } else {
                Vec::new()
            }
        };

        let (vector_results, keyword_entity_results, episode_results) =
            futures::join!(vector_fut, keyword_entity_fut, episode_fut);

        if vector_results.is_empty()
            && keyword_entity_results.is_empty()
            && episode_results.is_empty()
            && (include_entities || include_episodes)
        {
            return Err(SearchError::AllSubsearchesFailed);
        }

        let vector_count = vector_results.len();
        let keyword_count = keyword_entity_results.len() + episode_results.len();

        let combined_entities = rrf_fuse(
            vec![
                (vector_results, self.config.vector_weight),
                (keyword_entity_results, self.config.keyword_weight),
            ],
            self.config.rrf_k,
        );

        let mut all_results = combined_entities;
        all_results.extend(episode_results);
        all_results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let all_results = self.apply_post_processing(all_results);
        let total_results = all_results.len();
        let items = all_results.into_iter().take(limit).collect();

        Ok(SearchOutcome {
            items,
            total_results,
            vector_results_count: vector_count,
            keyword_results_count: keyword_count,
        })
    }

    /// Vector-only search over entities (spec.md §4.5 public surface
    /// mirroring `original_source`'s `vector_search`).
    pub async fn vector_search(
        &self,
        query: &str,
        project_id: Option<&str>,
        limit: usize,
    ) -> Vec<SearchResultItem> {
        self.vector_search_entities(query, project_id, limit).await
    }

    /// Keyword-only search over entities and/or episodes.
    pub async fn keyword_search(
        &self,
        query: &str,
        project_id: Option<&str>,
        limit: usize,
        include_episodes: bool,
        include_entities: bool,
    ) -> Vec<SearchResultItem> {
        let expanded_query = if self.config.query_expansion_enabled {
            expand_query(query)
        } else {
            query.to_string()
        };

        let entity_fut = async {
            if include_entities {
                self.keyword_search_entities(&expanded_query, project_id, limit).await
            } else {
                Vec::new()
            }
        };
        let episode_fut = async {
            if include_episodes {
                self.keyword_search_episodes(&expanded_query, project_id, limit).await
            } else {
                Vec::new()
            }
        };
        let (mut entities, episodes) = futures::join!(entity_fut, episode_fut);
        entities.extend(episodes);
        entities.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        entities.truncate(limit);
        entities
    }

    fn apply_post_processing(&self, items: Vec<SearchResultItem>) -> Vec<SearchResultItem> {
        if items.is_empty() {
            return items;
        }

        let mut items = items;

        if self.config.temporal_decay_enabled {
            let now = Utc::now();
            for item in &mut items {
                if let Some(created_at) = item
                    .metadata
                    .get("created_at")
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                {
                    item.score = apply_temporal_decay(
                        item.score,
                        created_at.with_timezone(&Utc),
                        self.config.temporal_half_life_days,
                        now,
                    );
                }
            }
            items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        }

        if self.config.mmr_enabled && items.len() > 1 {
            items = mmr_rerank(items, self.config.mmr_lambda);
        }

        items
    }

    async fn vector_search_entities(
        &self,
        query: &str,
        project_id: Option<&str>,
        limit: usize,
    ) -> Vec<SearchResultItem> {
        let embedding = match self.embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(err) => {
                tracing::warn!(%err, "failed to generate query embedding");
                return Vec::new();
            }
        };

        let expected_dim = self.embedder.dimension();
        if expected_dim != 0 && embedding.len() != expected_dim {
            tracing::warn!(
                got = embedding.len(),
                expected = expected_dim,
                "embedding dimension mismatch, skipping vector search"
            );
            return Vec::new();
        }

        let project_filter = if project_id.is_some() {
            "WHERE node.project_id = $project_id"
        } else {
            ""
        };
        let cypher = format!(
            "CALL db.index.vector.queryNodes($index_name, $fetch_limit, $query_embedding) \
             YIELD node, score \
             {project_filter} \
             RETURN node.uuid AS uuid, node.name AS name, node.summary AS summary, \
             coalesce(node.entity_type, 'Entity') AS entity_type, \
             node.created_at AS created_at, score \
             ORDER BY score DESC LIMIT $result_limit"
        );

        let mut params = base_params(project_id);
        params.insert("fetch_limit".to_string(), Value::from(limit as i64));
        params.insert("result_limit".to_string(), Value::from(limit as i64));
        params.insert(
            "query_embedding".to_string(),
            Value::Array(embedding.iter().map(|f| Value::from(*f as f64)).collect()),
        );

        let dimension_specific_index = format!("{}_{}D", self.config.vector_index_name, embedding.len());
        params.insert("index_name".to_string(), Value::String(dimension_specific_index));

        let rows = match self.graph.execute_query(&cypher, params.clone(), Duration::ZERO).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::debug!(%err, "dimension-specific vector index unavailable, trying default");
                params.insert(
                    "index_name".to_string(),
                    Value::String(self.config.vector_index_name.clone()),
                );
                match self.graph.execute_query(&cypher, params, Duration::ZERO).await {
                    Ok(rows) => rows,
                    Err(err) => {
                        tracing::warn!(%err, "vector search failed");
                        return Vec::new();
                    }
                }
            }
        };

        rows.into_iter()
            .map(|row| entity_row_to_item(row, "vector"))
            .collect()
    }

    async fn keyword_search_entities(
        &self,
        query: &str,
        project_id: Option<&str>,
        limit: usize,
    ) -> Vec<SearchResultItem> {
        let escaped = escape_fulltext_query(query);
        let project_filter = if project_id.is_some() {
            "WHERE node.project_id = $project_id"
        } else {
            ""
        };
        let cypher = format!(
            "CALL db.index.fulltext.queryNodes($index_name, $search_query) \
             YIELD node, score \
             {project_filter} \
             RETURN node.uuid AS uuid, node.name AS name, node.summary AS summary, \
             coalesce(node.entity_type, 'Entity') AS entity_type, \
             node.created_at AS created_at, score \
             ORDER BY score DESC LIMIT $limit"
        );

        let mut params = base_params(project_id);
        params.insert("search_query".to_string(), Value::String(escaped));
        params.insert("limit".to_string(), Value::from(limit as i64));
        params.insert(
            "index_name".to_string(),
            Value::String(self.config.fulltext_index_entities.clone()),
        );

        match self.graph.execute_query(&cypher, params, Duration::ZERO).await {
            Ok(rows) => rows.into_iter().map(|row| entity_row_to_item(row, "keyword")).collect(),
            Err(err) => {
                tracing::warn!(%err, "entity keyword search failed");
                Vec::new()
            }
        }
    }

    async fn keyword_search_episodes(
        &self,
        query: &str,
        project_id: Option<&str>,
        limit: usize,
    ) -> Vec<SearchResultItem> {
        let escaped = escape_fulltext_query(query);
        let project_filter = if project_id.is_some() {
            "WHERE node.project_id = $project_id"
        } else {
            ""
        };
        let cypher = format!(
            "CALL db.index.fulltext.queryNodes($index_name, $search_query) \
             YIELD node, score \
             {project_filter} \
             RETURN node.uuid AS uuid, node.name AS name, node.content AS content, \
             node.created_at AS created_at, score \
             ORDER BY score DESC LIMIT $limit"
        );

        let mut params = base_params(project_id);
        params.insert("search_query".to_string(), Value::String(escaped));
        params.insert("limit".to_string(), Value::from(limit as i64));
        params.insert(
            "index_name".to_string(),
            Value::String(self.config.fulltext_index_episodes.clone()),
        );

        match self.graph.execute_query(&cypher, params, Duration::ZERO).await {
            Ok(rows) => rows
                .into_iter()
                .map(|row| {
                    let mut metadata = HashMap::new();
                    metadata.insert("search_type".to_string(), Value::String("keyword".to_string()));
                    if let Some(created_at) = row.get("created_at") {
                        metadata.insert("created_at".to_string(), created_at.clone());
                    }
                    SearchResultItem {
                        kind: ResultKind::Episode,
                        uuid: row.get("uuid").and_then(Value::as_str).unwrap_or_default().to_string(),
                        name: row.get("name").and_then(Value::as_str).map(str::to_string),
                        content: row.get("content").and_then(Value::as_str).map(str::to_string),
                        summary: None,
                        score: row.get("score").and_then(Value::as_f64).unwrap_or_default(),
                        metadata,
                    }
                })
                .collect(),
            Err(err) => {
                tracing::warn!(%err, "episode keyword search failed");
                Vec::new()
            }
        }
    }
}

fn base_params(project_id: Option<&str>) -> HashMap<String, Value> {
    let mut params = HashMap::new();
    if let Some(project_id) = project_id {
        params.insert("project_id".to_string(), Value::String(project_id.to_string()));
    }
    params
}

fn entity_row_to_item(row: HashMap<String, Value>, search_type: &str) -> SearchResultItem {
    let mut metadata = HashMap::new();
    if let Some(entity_type) = row.get("entity_type") {
        metadata.insert("entity_type".to_string(), entity_type.clone());
    }
    metadata.insert("search_type".to_string(), Value::String(search_type.to_string()));
    if let Some(created_at) = row.get("created_at") {
        metadata.insert("created_at".to_string(), created_at.clone());
    }
    SearchResultItem {
        kind: ResultKind::Entity,
        uuid: row.get("uuid").and_then(Value::as_str).unwrap_or_default().to_string(),
        name: row.get("name").and_then(Value::as_str).map(str::to_string),
        content: None,
        summary: row.get("summary").and_then(Value::as_str).map(str::to_string),
        score: row.get("score").and_then(Value::as_f64).unwrap_or_default(),
        metadata,
    }
}
