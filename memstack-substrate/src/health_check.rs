//! Aggregated health checking, generalized from `health_check.py`'s
//! `SystemHealthChecker`: instead of one checker class per store type,
//! this operates over the `ping()` method every `memstack-core` store
//! trait already exposes, so it works uniformly across Postgres/Neo4j
//! /Redis adapters without a concrete dependency on any of them.

use memstack_core::{CacheClient, GraphBackend, RelationalStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

/// Health check result for one component.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Component name (e.g. `"postgres"`, `"neo4j"`, `"redis"`, `"system"`).
    pub service: String,
    /// Whether the component responded successfully within its timeout.
    pub healthy: bool,
    /// Human-readable status message.
    pub message: String,
    /// How long the check took.
    pub latency_ms: f64,
}

async fn timed_ping<F, Fut, E>(service: &str, timeout: Duration, check: F) -> HealthStatus
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let outcome = tokio::time::timeout(timeout, check()).await;
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

    match outcome {
        Ok(Ok(())) => HealthStatus {
            service: service.to_owned(),
            healthy: true,
            message: format!("{service} connection healthy"),
            latency_ms,
        },
        Ok(Err(e)) => HealthStatus {
            service: service.to_owned(),
            healthy: false,
            message: format!("{service} health check failed: {e}"),
            latency_ms,
        },
        Err(_) => HealthStatus {
            service: service.to_owned(),
            healthy: false,
            message: format!("{service} health check timeout after {}s", timeout.as_secs()),
            latency_ms,
        },
    }
}

/// Runs health checks against whichever stores are configured, in
/// parallel, and aggregates the result.
#[derive(Default)]
pub struct SystemHealthChecker {
    relational: Option<Arc<dyn RelationalStore>>,
    graph: Option<Arc<dyn GraphBackend>>,
    cache: Option<Arc<dyn CacheClient>>,
    timeout: Duration,
}

impl SystemHealthChecker {
    /// Create a checker with the given timeout per component (default
    /// 5 seconds, matching the original Postgres/Neo4j checker default).
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Attach a relational store to check.
    pub fn with_relational(mut self, store: Arc<dyn RelationalStore>) -> Self {
        self.relational = Some(store);
        self
    }

    /// Attach a graph backend to check.
    pub fn with_graph(mut self, backend: Arc<dyn GraphBackend>) -> Self {
        self.graph = Some(backend);
        self
    }

    /// Attach a cache client to check.
    pub fn with_cache(mut self, client: Arc<dyn CacheClient>) -> Self {
        self.cache = Some(client);
        self
    }

    /// Run every configured check concurrently and aggregate the result.
    pub async fn check_all(&self) -> HealthStatus {
        let mut futures: Vec<std::pin::Pin<Box<dyn std::future::Future<Output = HealthStatus> + Send>>> =
            Vec::new();

        if let Some(store) = self.relational.clone() {
            let timeout = self.timeout;
            futures.push(Box::pin(async move {
                timed_ping("postgres", timeout, || async move { store.ping().await }).await
            }));
        }
        if let Some(backend) = self.graph.clone() {
            let timeout = self.timeout;
            futures.push(Box::pin(async move {
                timed_ping("neo4j", timeout, || async move {
                    backend
                        .execute_query("RETURN 1", HashMap::new(), timeout)
                        .await
                        .map(|_| ())
                })
                .await
            }));
        }
        if let Some(client) = self.cache.clone() {
            let timeout = self.timeout;
            futures.push(Box::pin(async move {
                timed_ping("redis", timeout, || async move { client.ping().await }).await
            }));
        }

        let checks: Vec<HealthStatus> = futures::future::join_all(futures).await;
        let all_healthy = checks.iter().all(|c| c.healthy);
        let unhealthy: Vec<&str> = checks
            .iter()
            .filter(|c| !c.healthy)
            .map(|c| c.service.as_str())
            .collect();
        let latency_ms = checks.iter().map(|c| c.latency_ms).fold(0.0, f64::max);

        HealthStatus {
            service: "system".to_owned(),
            healthy: all_healthy,
            message: if all_healthy {
                "all services healthy".to_owned()
            } else {
                format!("unhealthy services: {}", unhealthy.join(", "))
            },
            latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstack_core::test_support::{FakeCacheClient, FakeGraphBackend, FakeRelationalStore};

    #[tokio::test]
    async fn all_healthy_when_every_store_pings_ok() {
        let checker = SystemHealthChecker::new(Duration::from_secs(1))
            .with_relational(Arc::new(FakeRelationalStore::new()))
            .with_graph(Arc::new(FakeGraphBackend::new()))
            .with_cache(Arc::new(FakeCacheClient::new()));
        let status = checker.check_all().await;
        assert!(status.healthy);
    }
}
