//! FakeGraphBackend — HashMap-backed GraphBackend for testing.

use crate::error::GraphError;
use crate::traits::{GraphBackend, RawNode};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredNode {
    labels: Vec<String>,
    properties: HashMap<String, Value>,
}

/// In-memory graph store. Supports node/edge persistence and uuid
/// lookups. `execute_query` has no real Cypher engine behind it, but
/// recognizes the handful of MERGE/MATCH shapes `memstack-graph`'s schema
/// store issues against the three `Schema*` labels, so schema bootstrap
/// and reload round-trip correctly in tests. Anything else returns an
/// empty result set.
#[derive(Default)]
pub struct FakeGraphBackend {
    nodes: RwLock<HashMap<Uuid, StoredNode>>,
    edges: RwLock<Vec<(Uuid, Uuid, String)>>,
    schema_rows: RwLock<HashMap<&'static str, Vec<HashMap<String, Value>>>>,
}

impl FakeGraphBackend {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of edges of `rel_type` between `from` and `to`.
    pub fn edge_count(&self, from: Uuid, to: Uuid, rel_type: &str) -> usize {
        self.edges
            .read()
            .expect("fake graph lock poisoned")
            .iter()
            .filter(|(f, t, r)| *f == from && *t == to && r == rel_type)
            .count()
    }
}

#[async_trait]
impl GraphBackend for FakeGraphBackend {
    async fn save_node(
        &self,
        labels: &[String],
        uuid: Uuid,
        props: HashMap<String, Value>,
    ) -> Result<(), GraphError> {
        let mut nodes = self.nodes.write().expect("fake graph lock poisoned");
        nodes.insert(
            uuid,
            StoredNode {
                labels: labels.to_vec(),
                properties: props,
            },
        );
        Ok(())
    }

    async fn save_edge(
        &self,
        from_uuid: Uuid,
        to_uuid: Uuid,
        rel_type: &str,
        props: Option<HashMap<String, Value>>,
    ) -> Result<(), GraphError> {
        {
            let nodes = self.nodes.read().expect("fake graph lock poisoned");
            if !nodes.contains_key(&from_uuid) || !nodes.contains_key(&to_uuid) {
                return Err(GraphError::NotFound(format!(
                    "edge endpoint missing: {from_uuid} -> {to_uuid}"
                )));
            }
        }
        let _ = props;
        let mut edges = self.edges.write().expect("fake graph lock poisoned");
        edges.push((from_uuid, to_uuid, rel_type.to_owned()));
        Ok(())
    }

    async fn delete_node(&self, uuid: Uuid) -> Result<(), GraphError> {
        let mut nodes = self.nodes.write().expect("fake graph lock poisoned");
        nodes.remove(&uuid);
        let mut edges = self.edges.write().expect("fake graph lock poisoned");
        edges.retain(|(from, to, _)| *from != uuid && *to != uuid);
        Ok(())
    }

    async fn find_node_by_uuid(
        &self,
        uuid: Uuid,
        labels: Option<&[String]>,
    ) -> Result<Option<RawNode>, GraphError> {
        let nodes = self.nodes.read().expect("fake graph lock poisoned");
        Ok(nodes.get(&uuid).and_then(|n| {
            let matches = labels
                .map(|want| want.iter().all(|l| n.labels.contains(l)))
                .unwrap_or(true);
            matches.then(|| RawNode {
                labels: n.labels.clone(),
                properties: n.properties.clone(),
            })
        }))
    }

    async fn execute_query(
        &self,
        cypher: &str,
        params: HashMap<String, Value>,
        _timeout: Duration,
    ) -> Result<Vec<HashMap<String, Value>>, GraphError> {
        let project_id = params
            .get("project_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if cypher.contains("SchemaEntityType") {
            if cypher.contains("UNWIND $types") {
                let Some(Value::Array(types)) = params.get("types") else {
                    return Ok(Vec::new());
                };
                for t in types {
                    let mut row = HashMap::new();
                    row.insert("project_id".to_string(), Value::String(project_id.clone()));
                    row.insert("id".to_string(), t.get("id").cloned().unwrap_or(Value::Null));
                    row.insert("name".to_string(), t.get("name").cloned().unwrap_or(Value::Null));
                    row.insert(
                        "description".to_string(),
                        t.get("description").cloned().unwrap_or(Value::Null),
                    );
                    self.upsert_schema_row("SchemaEntityType", &["project_id", "name"], row);
                }
                return Ok(Vec::new());
            }
            if cypher.starts_with("MERGE") {
                let mut row = HashMap::new();
                row.insert("project_id".to_string(), Value::String(project_id));
                for key in ["id", "name", "description"] {
                    if let Some(v) = params.get(key) {
                        row.insert(key.to_string(), v.clone());
                    }
                }
                self.upsert_schema_row("SchemaEntityType", &["project_id", "name"], row);
                return Ok(Vec::new());
            }
            return Ok(self.matching_schema_rows("SchemaEntityType", &project_id));
        }

        if cypher.contains("SchemaEdgeTypeMap") {
            if cypher.starts_with("MERGE") {
                let mut row = HashMap::new();
                row.insert("project_id".to_string(), Value::String(project_id));
                for key in ["source_type", "target_type", "edge_type"] {
                    if let Some(v) = params.get(key) {
                        row.insert(key.to_string(), v.clone());
                    }
                }
                self.upsert_schema_row(
                    "SchemaEdgeTypeMap",
                    &["project_id", "source_type", "target_type", "edge_type"],
                    row,
                );
                return Ok(Vec::new());
            }
            return Ok(self.matching_schema_rows("SchemaEdgeTypeMap", &project_id));
        }

        if cypher.contains("SchemaEdgeType") {
            if cypher.starts_with("MERGE") {
                let mut row = HashMap::new();
                row.insert("project_id".to_string(), Value::String(project_id));
                if let Some(v) = params.get("name") {
                    row.insert("name".to_string(), v.clone());
                }
                self.upsert_schema_row("SchemaEdgeType", &["project_id", "name"], row);
                return Ok(Vec::new());
            }
            return Ok(self.matching_schema_rows("SchemaEdgeType", &project_id));
        }

        Ok(Vec::new())
    }
}

impl FakeGraphBackend {
    fn upsert_schema_row(
        &self,
        label: &'static str,
        key_fields: &[&str],
        row: HashMap<String, Value>,
    ) {
        let mut rows = self.schema_rows.write().expect("fake graph lock poisoned");
        let bucket = rows.entry(label).or_default();
        let existing = bucket
            .iter_mut()
            .find(|r| key_fields.iter().all(|k| r.get(*k) == row.get(*k)));
        match existing {
            Some(existing) => *existing = row,
            None => bucket.push(row),
        }
    }

    fn matching_schema_rows(&self, label: &'static str, project_id: &str) -> Vec<HashMap<String, Value>> {
        let rows = self.schema_rows.read().expect("fake graph lock poisoned");
        let mut matched: Vec<_> = rows
            .get(label)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|r| r.get("project_id").and_then(Value::as_str) == Some(project_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matched.sort_by_key(|r| r.get("id").and_then(Value::as_u64).unwrap_or(0));
        matched
    }
}
