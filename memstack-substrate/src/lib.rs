//! # memstack-substrate — resilience primitives
//!
//! Cross-cutting adapters shared by every concrete store implementation:
//! retry-with-backoff, per-name circuit breakers, query performance
//! monitoring, aggregated health checks, and a cache-aside mixin. None
//! of this is specific to Postgres/Neo4j/Redis — it wraps whatever
//! fallible async call a caller hands it.

#![deny(missing_docs)]

pub mod cached_repository;
pub mod circuit_breaker;
pub mod error;
pub mod health_check;
pub mod query_monitor;
pub mod retry;

pub use cached_repository::cached_read;
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState,
};
pub use error::SubstrateExecError;
pub use health_check::{HealthStatus, SystemHealthChecker};
pub use query_monitor::{QueryMonitor, QueryMonitorConfig, QueryMonitorRegistry, QueryStats};
pub use retry::{is_transient, retry_with_backoff, RetryConfig};
