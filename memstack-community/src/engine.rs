//! [`CommunityEngine`] — detect, persist, summarize, and prune
//! communities for a project (spec.md §4.6).

use crate::accelerator::{GdsAccelerator, GraphAlgoAccelerator, NativeAccelerator};
use memstack_core::error::CommunityError;
use memstack_core::model::CommunityNode;
use memstack_core::scoping::Scoping;
use memstack_core::traits::{GraphBackend, Llm, LlmRequest};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Minimum member count a detected cluster needs to become a persisted
/// community (spec.md §4.6). Mirrors `LouvainDetector`'s default.
pub const DEFAULT_MIN_COMMUNITY_SIZE: usize = 2;

/// Detects, persists, summarizes, and prunes communities over a
/// project's entity graph, picking the native or GDS-accelerated path
/// per call via [`GraphBackend::supports_graph_data_science`].
pub struct CommunityEngine {
    graph: Arc<dyn GraphBackend>,
    llm: Arc<dyn Llm>,
    native: NativeAccelerator,
    gds: GdsAccelerator,
    min_community_size: usize,
}

impl CommunityEngine {
    /// Build an engine with the default minimum community size.
    pub fn new(graph: Arc<dyn GraphBackend>, llm: Arc<dyn Llm>) -> Self {
        Self {
            graph,
            llm,
            native: NativeAccelerator,
            gds: GdsAccelerator,
            min_community_size: DEFAULT_MIN_COMMUNITY_SIZE,
        }
    }

    /// Override the minimum community size (members below this are
    /// dropped before persistence).
    pub fn with_min_community_size(mut self, min_community_size: usize) -> Self {
        self.min_community_size = min_community_size;
        self
    }

    /// Detect communities for `scoping`'s project, filter by minimum
    /// size, summarize each with the configured [`Llm`], and persist
    /// community nodes plus `BELONGS_TO` edges. Returns the persisted
    /// communities.
    pub async fn detect_and_persist(
        &self,
        scoping: &Scoping,
    ) -> Result<Vec<CommunityNode>, CommunityError> {
        let raw = if self.graph.supports_graph_data_science() {
            match self.gds.detect(self.graph.as_ref(), scoping).await {
                Ok(communities) => communities,
                Err(err) => {
                    tracing::warn!(error = %err, "accelerated community detection failed, falling back to native");
                    self.native.detect(self.graph.as_ref(), scoping).await?
                }
            }
        } else {
            self.native.detect(self.graph.as_ref(), scoping).await?
        };

        let mut persisted = Vec::new();
        for member_uuids in raw {
            if member_uuids.len() < self.min_community_size {
                continue;
            }

            let members = self.fetch_member_summaries(&member_uuids).await?;
            let (name, summary) = self.summarize(&members).await;

            let community = CommunityNode::new(name, summary, member_uuids.len(), scoping.clone());
            self.persist(&community, &member_uuids).await?;
            persisted.push(community);
        }

        Ok(persisted)
    }

    /// Delete communities with zero remaining `BELONGS_TO` members.
    /// Returns the number deleted.
    pub async fn delete_stale_communities(&self, scoping: &Scoping) -> Result<u64, CommunityError> {
        let mut params = HashMap::new();
        params.insert("project_id".to_string(), Value::String(scoping.project_id.clone()));

        let rows = self
            .graph
            .execute_query(
                "MATCH (c:Community {project_id: $project_id}) \
                 WHERE NOT EXISTS { MATCH (e:Entity)-[:BELONGS_TO]->(c) } \
                 DETACH DELETE c \
                 RETURN count(c) AS deleted",
                params,
                Duration::ZERO,
            )
            .await
            .map_err(|e| CommunityError::Other(Box::new(e)))?;

        let deleted = rows
            .first()
            .and_then(|row| row.get("deleted"))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        Ok(deleted)
    }

    async fn fetch_member_summaries(
        &self,
        member_uuids: &[Uuid],
    ) -> Result<Vec<HashMap<String, Value>>, CommunityError> {
        let mut params = HashMap::new();
        params.insert(
            "uuids".to_string(),
            Value::Array(member_uuids.iter().map(|u| Value::String(u.to_string())).collect()),
        );

        self.graph
            .execute_query(
                "MATCH (e:Entity) WHERE e.uuid IN $uuids \
                 RETURN e.uuid AS uuid, e.name AS name, e.entity_type AS entity_type, e.summary AS summary",
                params,
                Duration::ZERO,
            )
            .await
            .map_err(|e| CommunityError::Other(Box::new(e)))
    }

    async fn persist(&self, community: &CommunityNode, member_uuids: &[Uuid]) -> Result<(), CommunityError> {
        let mut props = HashMap::new();
        props.insert("summary".to_string(), Value::String(community.summary.clone()));
        props.insert("member_count".to_string(), Value::from(community.member_count));
        props.insert("tenant_id".to_string(), Value::String(community.scoping.tenant_id.clone()));
        props.insert("project_id".to_string(), Value::String(community.scoping.project_id.clone()));

        self.graph
            .save_node(&["Community".to_string()], community.id, props)
            .await
            .map_err(|e| CommunityError::Other(Box::new(e)))?;

        for &member in member_uuids {
            self.graph
                .save_edge(member, community.id, "BELONGS_TO", None)
                .await
                .map_err(|e| CommunityError::Other(Box::new(e)))?;
        }

        Ok(())
    }

    async fn summarize(&self, members: &[HashMap<String, Value>]) -> (String, String) {
        if members.is_empty() {
            return ("Community".to_string(), String::new());
        }

        let names: Vec<&str> = members
            .iter()
            .filter_map(|m| m.get("name").and_then(Value::as_str))
            .collect();

        let system = "You summarize a cluster of related entities from a knowledge graph into a \
                       short name and one-sentence summary. Respond as `NAME: <name>` then `SUMMARY: <summary>`, \
                       nothing else."
            .to_string();
        let prompt = format!("Entities in this cluster: {}", names.join(", "));

        let request = LlmRequest { system, prompt, model: None };

        match self.llm.complete(request).await {
            Ok(text) => parse_summary_response(&text, &names),
            Err(err) => {
                tracing::warn!(error = %err, "community summarization failed, using fallback name");
                (fallback_name(&names), String::new())
            }
        }
    }
}

fn parse_summary_response(text: &str, names: &[&str]) -> (String, String) {
    let mut name = None;
    let mut summary = None;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("NAME:") {
            name = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("SUMMARY:") {
            summary = Some(rest.trim().to_string());
        }
    }
    (name.unwrap_or_else(|| fallback_name(names)), summary.unwrap_or_default())
}

fn fallback_name(names: &[&str]) -> String {
    names.first().map(|n| format!("{n} and related entities")).unwrap_or_else(|| "Community".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstack_core::test_support::{FakeGraphBackend, FakeLlm};

    #[tokio::test]
    async fn no_entities_detects_no_communities() {
        let graph = Arc::new(FakeGraphBackend::new());
        let llm = Arc::new(FakeLlm::new(vec![]));
        let engine = CommunityEngine::new(graph, llm);
        let scoping = Scoping::new("tenant-a", "project-a");

        let communities = engine.detect_and_persist(&scoping).await.unwrap();
        assert!(communities.is_empty());
    }

    #[tokio::test]
    async fn stale_communities_with_no_members_are_counted_as_deleted() {
        let graph = Arc::new(FakeGraphBackend::new());
        let llm = Arc::new(FakeLlm::new(vec![]));
        let engine = CommunityEngine::new(graph, llm);
        let scoping = Scoping::new("tenant-a", "project-a");

        let deleted = engine.delete_stale_communities(&scoping).await.unwrap();
        assert_eq!(deleted, 0);
    }

    #[test]
    fn parse_summary_response_reads_both_lines() {
        let (name, summary) = parse_summary_response("NAME: Payments Team\nSUMMARY: People working on billing.", &[]);
        assert_eq!(name, "Payments Team");
        assert_eq!(summary, "People working on billing.");
    }

    #[test]
    fn parse_summary_response_falls_back_on_malformed_text() {
        let (name, summary) = parse_summary_response("not in the expected format", &["Alice"]);
        assert_eq!(name, "Alice and related entities");
        assert!(summary.is_empty());
    }
}
