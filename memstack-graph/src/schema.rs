//! Per-project [`SchemaContext`] loading, TTL caching, and discovered-type
//! persistence (spec.md §4.3 "Schema context").

use memstack_core::error::GraphError;
use memstack_core::model::{DiscoveredDelta, EdgeTypeKey, EntityTypeDescriptor, SchemaContext};
use memstack_core::traits::GraphBackend;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// How long a loaded [`SchemaContext`] is trusted before the next access
/// reloads it from the graph.
#[derive(Debug, Clone, Copy)]
pub struct SchemaStoreConfig {
    /// Cache time-to-live.
    pub ttl: Duration,
}

impl Default for SchemaStoreConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
        }
    }
}

struct CacheEntry {
    loaded_at: Instant,
    context: SchemaContext,
}

/// Owns the in-memory, per-project [`SchemaContext`] cache and the
/// bootstrap/persistence logic backing it. Generic over [`GraphBackend`]
/// so it can be exercised against `memstack_core::test_support`'s fake in
/// unit tests without a live Neo4j instance.
pub struct SchemaStore {
    graph: Arc<dyn GraphBackend>,
    config: SchemaStoreConfig,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl SchemaStore {
    /// Build a schema store over the given graph backend.
    pub fn new(graph: Arc<dyn GraphBackend>, config: SchemaStoreConfig) -> Self {
        Self {
            graph,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Return the project's schema context, loading and bootstrapping it
    /// on first access. Cached entries younger than `ttl` are returned
    /// without touching the graph.
    pub async fn get_or_bootstrap(&self, project: &str) -> Result<SchemaContext, GraphError> {
        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(project) {
                if entry.loaded_at.elapsed() < self.config.ttl {
                    return Ok(entry.context.clone());
                }
            }
        }

        let mut context = self.load_from_graph(project).await?;
        if context.entity_types.is_empty() {
            self.bootstrap_defaults(project).await?;
            context = self.load_from_graph(project).await?;
        }

        self.cache.lock().await.insert(
            project.to_string(),
            CacheEntry {
                loaded_at: Instant::now(),
                context: context.clone(),
            },
        );
        Ok(context)
    }

    /// Upsert newly discovered entity types, edge types, and edge-type
    /// mappings, skipping anything already known, and invalidate the
    /// cached context for `project`.
    pub async fn save_discovered_types_batch(
        &self,
        project: &str,
        new_entity_types: &[(String, String)],
        new_edge_types: &[String],
        new_edge_type_maps: &[(EdgeTypeKey, String)],
    ) -> Result<DiscoveredDelta, GraphError> {
        let mut context = self.load_from_graph(project).await?;
        let delta = context.merge_discovered(new_entity_types, new_edge_types, new_edge_type_maps);
        if delta.is_empty() {
            return Ok(delta);
        }

        for name in &delta.entity_types {
            let descriptor = context
                .entity_types
                .iter()
                .find(|t| &t.name == name)
                .expect("merge_discovered only reports names it just inserted");
            self.insert_entity_type(project, descriptor).await?;
        }
        for name in &delta.edge_types {
            self.insert_edge_type(project, name).await?;
        }
        for (key, edge_name) in &delta.edge_type_maps {
            self.insert_edge_type_map(project, key, edge_name).await?;
        }

        self.cache.lock().await.remove(project);
        Ok(delta)
    }

    async fn bootstrap_defaults(&self, project: &str) -> Result<(), GraphError> {
        let mut params = HashMap::new();
        params.insert("project_id".to_string(), Value::String(project.to_string()));
        let rows: Vec<Value> = memstack_core::model::schema::DEFAULT_ENTITY_TYPES
            .iter()
            .map(|(id, name, description)| {
                serde_json::json!({"id": id, "name": name, "description": description})
            })
            .collect();
        params.insert("types".to_string(), Value::Array(rows));

        self.graph
            .execute_query(
                "UNWIND $types AS t \
                 MERGE (s:SchemaEntityType {project_id: $project_id, name: t.name}) \
                 SET s.id = t.id, s.description = t.description",
                params,
                Duration::ZERO,
            )
            .await?;
        Ok(())
    }

    async fn insert_entity_type(
        &self,
        project: &str,
        descriptor: &EntityTypeDescriptor,
    ) -> Result<(), GraphError> {
        let mut params = HashMap::new();
        params.insert("project_id".to_string(), Value::String(project.to_string()));
        params.insert("id".to_string(), Value::from(descriptor.id));
        params.insert("name".to_string(), Value::String(descriptor.name.clone()));
        params.insert(
            "description".to_string(),
            Value::String(descriptor.description.clone()),
        );
        self.graph
            .execute_query(
                "MERGE (s:SchemaEntityType {project_id: $project_id, name: $name}) \
                 SET s.id = $id, s.description = $description",
                params,
                Duration::ZERO,
            )
            .await?;
        Ok(())
    }

    async fn insert_edge_type(&self, project: &str, name: &str) -> Result<(), GraphError> {
        let mut params = HashMap::new();
        params.insert("project_id".to_string(), Value::String(project.to_string()));
        params.insert("name".to_string(), Value::String(name.to_string()));
        self.graph
            .execute_query(
                "MERGE (e:SchemaEdgeType {project_id: $project_id, name: $name})",
                params,
                Duration::ZERO,
            )
            .await?;
        Ok(())
    }

    async fn insert_edge_type_map(
        &self,
        project: &str,
        key: &EdgeTypeKey,
        edge_name: &str,
    ) -> Result<(), GraphError> {
        let mut params = HashMap::new();
        params.insert("project_id".to_string(), Value::String(project.to_string()));
        params.insert("source_type".to_string(), Value::String(key.0.clone()));
        params.insert("target_type".to_string(), Value::String(key.1.clone()));
        params.insert("edge_type".to_string(), Value::String(edge_name.to_string()));
        self.graph
            .execute_query(
                "MERGE (m:SchemaEdgeTypeMap {project_id: $project_id, source_type: $source_type, \
                 target_type: $target_type, edge_type: $edge_type})",
                params,
                Duration::ZERO,
            )
            .await?;
        Ok(())
    }

    async fn load_from_graph(&self, project: &str) -> Result<SchemaContext, GraphError> {
        let mut params = HashMap::new();
        params.insert("project_id".to_string(), Value::String(project.to_string()));

        let entity_rows = self
            .graph
            .execute_query(
                "MATCH (s:SchemaEntityType {project_id: $project_id}) \
                 RETURN s.id AS id, s.name AS name, s.description AS description \
                 ORDER BY s.id",
                params.clone(),
                Duration::ZERO,
            )
            .await?;

        let mut context = SchemaContext {
            entity_types: Vec::new(),
            edge_types: Default::default(),
            edge_type_map: Default::default(),
        };
        for row in entity_rows {
            let id = row.get("id").and_then(Value::as_u64).unwrap_or_default() as u32;
            let name = row
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let description = row
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            context
                .entity_types
                .push(EntityTypeDescriptor { id, name, description });
        }

        let edge_rows = self
            .graph
            .execute_query(
                "MATCH (e:SchemaEdgeType {project_id: $project_id}) RETURN e.name AS name",
                params.clone(),
                Duration::ZERO,
            )
            .await?;
        for row in edge_rows {
            if let Some(name) = row.get("name").and_then(Value::as_str) {
                context.edge_types.insert(name.to_string());
            }
        }

        let map_rows = self
            .graph
            .execute_query(
                "MATCH (m:SchemaEdgeTypeMap {project_id: $project_id}) \
                 RETURN m.source_type AS source_type, m.target_type AS target_type, \
                 m.edge_type AS edge_type",
                params,
                Duration::ZERO,
            )
            .await?;
        for row in map_rows {
            let source = row.get("source_type").and_then(Value::as_str);
            let target = row.get("target_type").and_then(Value::as_str);
            let edge_type = row.get("edge_type").and_then(Value::as_str);
            if let (Some(source), Some(target), Some(edge_type)) = (source, target, edge_type) {
                context
                    .edge_type_map
                    .entry((source.to_string(), target.to_string()))
                    .or_default()
                    .insert(edge_type.to_string());
            }
        }

        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstack_core::test_support::FakeGraphBackend;

    fn store() -> SchemaStore {
        SchemaStore::new(Arc::new(FakeGraphBackend::new()), SchemaStoreConfig::default())
    }

    #[tokio::test]
    async fn first_access_bootstraps_seven_defaults() {
        let store = store();
        let context = store.get_or_bootstrap("proj-1").await.unwrap();
        assert_eq!(context.entity_types.len(), 7);
        assert_eq!(context.entity_types[0].name, "Entity");
    }

    #[tokio::test]
    async fn second_access_within_ttl_is_cached() {
        let store = store();
        let first = store.get_or_bootstrap("proj-1").await.unwrap();
        let second = store.get_or_bootstrap("proj-1").await.unwrap();
        assert_eq!(first.entity_types.len(), second.entity_types.len());
    }

    #[tokio::test]
    async fn save_discovered_types_batch_invalidates_cache() {
        let store = store();
        store.get_or_bootstrap("proj-1").await.unwrap();

        let delta = store
            .save_discovered_types_batch(
                "proj-1",
                &[("Skill".to_string(), "A learned skill".to_string())],
                &[],
                &[],
            )
            .await
            .unwrap();
        assert_eq!(delta.entity_types, vec!["Skill".to_string()]);

        let context = store.get_or_bootstrap("proj-1").await.unwrap();
        assert!(context.entity_types.iter().any(|t| t.name == "Skill"));
    }
}
