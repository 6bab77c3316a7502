//! Connection tuning for [`crate::Neo4jGraphStore`] (spec.md §4.3
//! "Connection parameters").

use std::time::Duration;

/// Pool and timeout knobs for a Neo4j connection.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Bolt URI, e.g. `bolt://localhost:7687`.
    pub uri: String,
    /// Username.
    pub user: String,
    /// Password.
    pub password: String,
    /// Database name.
    pub database: String,
    /// Max pool connections.
    pub pool_size: usize,
    /// Timeout waiting to acquire a pooled connection.
    pub connection_acquisition_timeout: Duration,
    /// Timeout establishing a new connection.
    pub connect_timeout: Duration,
    /// Max lifetime of a pooled connection before it is recycled.
    pub max_connection_lifetime: Duration,
    /// Default per-call deadline when the caller does not specify one.
    pub default_query_timeout: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
            database: "neo4j".to_string(),
            pool_size: 16,
            connection_acquisition_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            max_connection_lifetime: Duration::from_secs(3600),
            default_query_timeout: Duration::from_secs(30),
        }
    }
}
