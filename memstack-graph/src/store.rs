//! [`Neo4jGraphStore`] — the concrete [`GraphBackend`] implementation.

use crate::config::GraphConfig;
use crate::identifier::validate_identifiers;
use async_trait::async_trait;
use memstack_core::error::GraphError;
use memstack_core::traits::{GraphBackend, RawNode};
use neo4rs::{ConfigBuilder, Graph, Query};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// A pooled connection to a Neo4j instance, validating every identifier
/// before it reaches a query string (spec.md §4.3).
pub struct Neo4jGraphStore {
    graph: Graph,
    config: GraphConfig,
    supports_gds: bool,
}

impl Neo4jGraphStore {
    /// Connect using the given configuration. `supports_gds` is a
    /// deployment-time flag (GDS is a separately licensed plugin; there
    /// is no reliable runtime probe worth the round trip on every boot).
    pub async fn connect(config: GraphConfig, supports_gds: bool) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(config.pool_size)
            .fetch_size(500)
            .build()
            .map_err(|e| GraphError::Backend(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Backend(e.to_string()))?;

        Ok(Self {
            graph,
            config,
            supports_gds,
        })
    }

    fn deadline_or_default(&self, timeout: Duration) -> Duration {
        if timeout.is_zero() {
            self.config.default_query_timeout
        } else {
            timeout
        }
    }

    async fn run_query(
        &self,
        cypher: &str,
        params: HashMap<String, Value>,
        timeout: Duration,
    ) -> Result<Vec<HashMap<String, Value>>, GraphError> {
        let mut query = Query::new(cypher.to_string());
        for (key, value) in &params {
            query = query.param(key.as_str(), json_to_bolt(value));
        }

        let deadline = self.deadline_or_default(timeout);
        let run = async {
            let mut stream = self
                .graph
                .execute(query)
                .await
                .map_err(|e| GraphError::Backend(e.to_string()))?;

            let mut rows = Vec::new();
            while let Some(row) = stream
                .next()
                .await
                .map_err(|e| GraphError::Backend(e.to_string()))?
            {
                rows.push(row_to_map(&row));
            }
            Ok(rows)
        };

        tokio::time::timeout(deadline, run)
            .await
            .map_err(|_| GraphError::Timeout(deadline.as_millis() as u64))?
    }
}

#[async_trait]
impl GraphBackend for Neo4jGraphStore {
    async fn save_node(
        &self,
        labels: &[String],
        uuid: Uuid,
        props: HashMap<String, Value>,
    ) -> Result<(), GraphError> {
        validate_identifiers(labels.iter().map(String::as_str))?;
        validate_identifiers(props.keys().map(String::as_str))?;

        let label_clause = labels
            .iter()
            .map(|l| format!(":{l}"))
            .collect::<Vec<_>>()
            .join("");
        let set_clause = props
            .keys()
            .map(|k| format!("n.{k} = $props.{k}"))
            .collect::<Vec<_>>()
            .join(", ");
        let cypher = if set_clause.is_empty() {
            format!("MERGE (n{label_clause} {{uuid: $uuid}})")
        } else {
            format!("MERGE (n{label_clause} {{uuid: $uuid}}) SET {set_clause}")
        };

        let mut params = HashMap::new();
        params.insert("uuid".to_string(), Value::String(uuid.to_string()));
        params.insert("props".to_string(), Value::Object(props.into_iter().collect()));

        self.run_query(&cypher, params, Duration::ZERO).await?;
        Ok(())
    }

    async fn save_edge(
        &self,
        from_uuid: Uuid,
        to_uuid: Uuid,
        rel_type: &str,
        props: Option<HashMap<String, Value>>,
    ) -> Result<(), GraphError> {
        validate_identifiers([rel_type])?;
        if let Some(ref props) = props {
            validate_identifiers(props.keys().map(String::as_str))?;
        }

        let set_clause = props
            .as_ref()
            .map(|p| {
                p.keys()
                    .map(|k| format!("r.{k} = $props.{k}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        let cypher = format!(
            "MATCH (a {{uuid: $from}}), (b {{uuid: $to}}) \
             MERGE (a)-[r:{rel_type}]->(b){}",
            if set_clause.is_empty() {
                String::new()
            } else {
                format!(" SET {set_clause}")
            }
        );

        let mut params = HashMap::new();
        params.insert("from".to_string(), Value::String(from_uuid.to_string()));
        params.insert("to".to_string(), Value::String(to_uuid.to_string()));
        params.insert(
            "props".to_string(),
            Value::Object(props.unwrap_or_default().into_iter().collect()),
        );

        self.run_query(&cypher, params, Duration::ZERO).await?;
        Ok(())
    }

    async fn delete_node(&self, uuid: Uuid) -> Result<(), GraphError> {
        let mut params = HashMap::new();
        params.insert("uuid".to_string(), Value::String(uuid.to_string()));
        self.run_query(
            "MATCH (n {uuid: $uuid}) DETACH DELETE n",
            params,
            Duration::ZERO,
        )
        .await?;
        Ok(())
    }

    async fn find_node_by_uuid(
        &self,
        uuid: Uuid,
        labels: Option<&[String]>,
    ) -> Result<Option<RawNode>, GraphError> {
        let label_clause = match labels {
            Some(labels) => {
                validate_identifiers(labels.iter().map(String::as_str))?;
                labels.iter().map(|l| format!(":{l}")).collect::<Vec<_>>().join("")
            }
            None => String::new(),
        };
        let cypher = format!("MATCH (n{label_clause} {{uuid: $uuid}}) RETURN n LIMIT 1");

        let mut params = HashMap::new();
        params.insert("uuid".to_string(), Value::String(uuid.to_string()));

        let mut rows = self.run_query(&cypher, params, Duration::ZERO).await?;
        let Some(row) = rows.pop() else {
            return Ok(None);
        };
        let Some(Value::Object(props)) = row.get("n").cloned() else {
            return Ok(None);
        };
        Ok(Some(RawNode {
            labels: labels.map(|l| l.to_vec()).unwrap_or_default(),
            properties: props.into_iter().collect(),
        }))
    }

    async fn execute_query(
        &self,
        cypher: &str,
        params: HashMap<String, Value>,
        timeout: Duration,
    ) -> Result<Vec<HashMap<String, Value>>, GraphError> {
        self.run_query(cypher, params, timeout).await
    }

    fn supports_graph_data_science(&self) -> bool {
        self.supports_gds
    }
}

fn json_to_bolt(value: &Value) -> neo4rs::BoltType {
    use neo4rs::BoltType;
    match value {
        Value::Null => BoltType::Null(neo4rs::BoltNull),
        Value::Bool(b) => BoltType::Boolean(neo4rs::BoltBoolean::new(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                BoltType::Integer(neo4rs::BoltInteger::new(i))
            } else {
                BoltType::Float(neo4rs::BoltFloat::new(n.as_f64().unwrap_or_default()))
            }
        }
        Value::String(s) => BoltType::String(neo4rs::BoltString::new(s)),
        Value::Array(items) => {
            let list: Vec<BoltType> = items.iter().map(json_to_bolt).collect();
            BoltType::List(neo4rs::BoltList::from(list))
        }
        Value::Object(map) => {
            let mut bolt_map = neo4rs::BoltMap::default();
            for (k, v) in map {
                bolt_map.put(neo4rs::BoltString::new(k), json_to_bolt(v));
            }
            BoltType::Map(bolt_map)
        }
    }
}

fn row_to_map(row: &neo4rs::Row) -> HashMap<String, Value> {
    row.to::<Map<String, Value>>()
        .map(|m| m.into_iter().collect())
        .unwrap_or_default()
}
