//! [`CacheClient`] — the Redis-backed caching boundary (spec.md §4.1
//! "Cached Repository", §6).

use async_trait::async_trait;
use std::time::Duration;

/// Errors from the cache client. Per spec.md §7 "Cache operations never
/// fail the caller" — callers are expected to treat every `Err` here as
/// equivalent to a cache miss, never propagate it.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Backend communication failure.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// A Redis-shaped cache boundary: get/set with TTL, delete, and
/// pattern-based invalidation (`namespace:*`).
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Fetch a raw value by key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a raw value with an optional TTL.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Delete a single key.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key matching a glob pattern (e.g. `"namespace:*"`).
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError>;

    /// Minimal liveness probe for the health checker.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// A no-op cache client. Every operation is a no-op fallthrough (spec.md
/// §4.1 "Null cache client ⇒ all operations are no-op fallthroughs").
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

#[async_trait]
impl CacheClient for NullCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete_pattern(&self, _pattern: &str) -> Result<u64, CacheError> {
        Ok(0)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
