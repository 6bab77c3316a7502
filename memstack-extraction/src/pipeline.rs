//! [`ExtractionPipeline`] — entity extraction, optional reflexion,
//! exclusion filtering, deduplication, and relationship extraction
//! (spec.md §4.4 "Extraction pipeline").

use crate::candidate::{parse_entity_candidates, parse_relationship_candidates};
use crate::dedup::HashDeduplicator;
use crate::prompts::{entity_extraction_prompt, reflexion_prompt, relationship_extraction_prompt};
use memstack_core::error::ExtractionError;
use memstack_core::model::{EntityEdge, EntityNode, SchemaContext};
use memstack_core::scoping::Scoping;
use memstack_core::traits::{Llm, LlmRequest};
use std::collections::HashSet;
use std::sync::Arc;

/// How many reflexion rounds to run after the initial extraction pass.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionConfig {
    /// Maximum reflexion iterations. `0` disables reflexion entirely.
    pub reflexion_max_iterations: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            reflexion_max_iterations: 2,
        }
    }
}

/// Orchestrates one episode's worth of LLM-driven extraction: entities,
/// then relationships, over a validated and deduplicated entity set.
pub struct ExtractionPipeline {
    llm: Arc<dyn Llm>,
    dedup: HashDeduplicator,
    config: ExtractionConfig,
}

impl ExtractionPipeline {
    /// Build a pipeline over the given LLM boundary.
    pub fn new(llm: Arc<dyn Llm>, config: ExtractionConfig) -> Self {
        Self {
            llm,
            dedup: HashDeduplicator::new(),
            config,
        }
    }

    /// Run the full pipeline against one piece of episode content.
    ///
    /// `exclude_entity_types` names types the caller has opted out of
    /// extracting (spec.md §4.4 step 3); `existing_entities` is the set
    /// already persisted for this project, used to dedup new extractions
    /// against (step 4).
    pub async fn extract(
        &self,
        content: &str,
        schema: &SchemaContext,
        scoping: &Scoping,
        exclude_entity_types: &[String],
        existing_entities: &[EntityNode],
    ) -> Result<(Vec<EntityNode>, Vec<EntityEdge>), ExtractionError> {
        let mut entities = self.extract_entities(content, schema, scoping).await?;

        if self.config.reflexion_max_iterations > 0 {
            entities = self
                .run_reflexion(content, schema, scoping, entities)
                .await?;
        }

        entities = self.dedup.dedupe(entities);

        if !exclude_entity_types.is_empty() {
            entities.retain(|e| !exclude_entity_types.iter().any(|t| t == &e.entity_type));
        }

        let (entities, _duplicate_map) = self.dedup.dedupe_against(entities, existing_entities);

        if entities.is_empty() {
            return Ok((entities, Vec::new()));
        }

        let edges = self
            .extract_relationships(content, schema, &entities)
            .await?;

        Ok((entities, edges))
    }

    async fn extract_entities(
        &self,
        content: &str,
        schema: &SchemaContext,
        scoping: &Scoping,
    ) -> Result<Vec<EntityNode>, ExtractionError> {
        let (system, prompt) = entity_extraction_prompt(content, schema);
        let raw = self
            .llm
            .complete(LlmRequest {
                system,
                prompt,
                model: None,
            })
            .await
            .map_err(|e| ExtractionError::Llm(e.to_string()))?;

        let candidates = parse_entity_candidates(&raw);
        Ok(candidates_to_entities(candidates, scoping))
    }

    async fn run_reflexion(
        &self,
        content: &str,
        schema: &SchemaContext,
        scoping: &Scoping,
        mut entities: Vec<EntityNode>,
    ) -> Result<Vec<EntityNode>, ExtractionError> {
        for _ in 0..self.config.reflexion_max_iterations {
            let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
            let (system, prompt) = reflexion_prompt(content, &names);
            let raw = self
                .llm
                .complete(LlmRequest {
                    system,
                    prompt,
                    model: None,
                })
                .await
                .map_err(|e| ExtractionError::Llm(e.to_string()))?;

            let candidates = parse_entity_candidates(&raw);
            if candidates.is_empty() {
                break;
            }
            let new_entities = candidates_to_entities(candidates, scoping);
            entities.extend(new_entities);
        }

        let _ = schema;
        Ok(entities)
    }

    async fn extract_relationships(
        &self,
        content: &str,
        schema: &SchemaContext,
        entities: &[EntityNode],
    ) -> Result<Vec<EntityEdge>, ExtractionError> {
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        let (system, prompt) = relationship_extraction_prompt(content, &names);
        let raw = self
            .llm
            .complete(LlmRequest {
                system,
                prompt,
                model: None,
            })
            .await
            .map_err(|e| ExtractionError::Llm(e.to_string()))?;

        let candidates = parse_relationship_candidates(&raw);
        let by_name: std::collections::HashMap<&str, &EntityNode> =
            entities.iter().map(|e| (e.name.as_str(), e)).collect();

        let mut edges = Vec::new();
        let mut seen: HashSet<(uuid::Uuid, uuid::Uuid, String)> = HashSet::new();
        for candidate in candidates {
            if !candidate.is_complete() {
                continue;
            }
            let from_name = candidate.from_entity.as_deref().unwrap_or_default();
            let to_name = candidate.to_entity.as_deref().unwrap_or_default();
            let relationship_type = candidate.relationship_type.clone().unwrap_or_default();

            let (Some(from), Some(to)) = (by_name.get(from_name), by_name.get(to_name)) else {
                tracing::debug!(from_name, to_name, "relationship endpoint not in entity set, dropped");
                continue;
            };

            if !schema.allows_edge(&from.entity_type, &to.entity_type, &relationship_type) {
                tracing::debug!(
                    relationship_type,
                    source_type = %from.entity_type,
                    target_type = %to.entity_type,
                    "relationship type not allowed between these entity types, dropped"
                );
                continue;
            }

            let key = (from.id, to.id, relationship_type.clone());
            if !seen.insert(key) {
                continue;
            }

            let weight = candidate.weight.unwrap_or(1.0).clamp(0.0, 1.0);
            let summary = candidate.summary.clone().unwrap_or_default();
            match EntityEdge::new(from.id, to.id, relationship_type, summary, weight) {
                Ok(edge) => edges.push(edge),
                Err(err) => tracing::warn!(%err, "dropping edge with invalid weight"),
            }
        }

        Ok(edges)
    }
}

fn candidates_to_entities(
    candidates: Vec<crate::candidate::EntityCandidate>,
    scoping: &Scoping,
) -> Vec<EntityNode> {
    let now = chrono::Utc::now();
    candidates
        .into_iter()
        .filter(|c| c.is_complete())
        .map(|c| {
            let mut entity = EntityNode::new(
                c.name.expect("checked complete"),
                c.entity_type.expect("checked complete"),
                scoping.clone(),
                now,
            );
            entity.summary = c.summary;
            if let Some(attributes) = c.attributes {
                entity.attributes = attributes;
            }
            entity
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstack_core::test_support::FakeLlm;

    fn scoping() -> Scoping {
        Scoping::new("tenant", "project")
    }

    #[tokio::test]
    async fn extracts_entities_and_relationships_from_llm_output() {
        let llm = Arc::new(FakeLlm::new(vec![
            r#"[{"name": "Ada", "entity_type": "Person"}, {"name": "Grace", "entity_type": "Person"}]"#.to_string(),
            "[]".to_string(),
            r#"[{"from_entity": "Ada", "to_entity": "Grace", "relationship_type": "KNOWS", "weight": 0.9}]"#.to_string(),
        ]));
        let pipeline = ExtractionPipeline::new(llm, ExtractionConfig::default());
        let schema = SchemaContext::with_defaults();

        let (entities, edges) = pipeline
            .extract("Ada and Grace worked together.", &schema, &scoping(), &[], &[])
            .await
            .unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relationship_type, "KNOWS");
    }

    #[tokio::test]
    async fn excludes_configured_entity_types() {
        let llm = Arc::new(FakeLlm::new(vec![
            r#"[{"name": "Ada", "entity_type": "Person"}, {"name": "Acme", "entity_type": "Organization"}]"#.to_string(),
            "[]".to_string(),
            "[]".to_string(),
        ]));
        let pipeline = ExtractionPipeline::new(llm, ExtractionConfig::default());
        let schema = SchemaContext::with_defaults();

        let (entities, _edges) = pipeline
            .extract(
                "Ada works at Acme.",
                &schema,
                &scoping(),
                &["Organization".to_string()],
                &[],
            )
            .await
            .unwrap();

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "Ada");
    }

    #[tokio::test]
    async fn relationship_with_unknown_endpoint_is_dropped() {
        let llm = Arc::new(FakeLlm::new(vec![
            r#"[{"name": "Ada", "entity_type": "Person"}]"#.to_string(),
            "[]".to_string(),
            r#"[{"from_entity": "Ada", "to_entity": "Ghost", "relationship_type": "KNOWS"}]"#
                .to_string(),
        ]));
        let pipeline = ExtractionPipeline::new(llm, ExtractionConfig::default());
        let schema = SchemaContext::with_defaults();

        let (entities, edges) = pipeline
            .extract("Ada.", &schema, &scoping(), &[], &[])
            .await
            .unwrap();

        assert_eq!(entities.len(), 1);
        assert!(edges.is_empty());
    }

    #[tokio::test]
    async fn dedups_against_existing_entities() {
        let existing = EntityNode::new("Ada", "Person", scoping(), chrono::Utc::now());
        let llm = Arc::new(FakeLlm::new(vec![
            r#"[{"name": "Ada", "entity_type": "Person"}]"#.to_string(),
            "[]".to_string(),
            "[]".to_string(),
        ]));
        let pipeline = ExtractionPipeline::new(llm, ExtractionConfig::default());
        let schema = SchemaContext::with_defaults();

        let (entities, _edges) = pipeline
            .extract("Ada again.", &schema, &scoping(), &[], &[existing])
            .await
            .unwrap();

        assert!(entities.is_empty());
    }
}
