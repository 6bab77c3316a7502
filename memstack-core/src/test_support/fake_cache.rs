//! FakeCacheClient — HashMap-backed CacheClient for testing.

use crate::traits::{CacheClient, CacheError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// In-memory cache client backed by a `HashMap` behind a `RwLock`. TTLs
/// are recorded but never expired automatically — tests that care about
/// expiry drive a [`crate::test_support::FakeClock`] themselves and
/// check entries directly.
#[derive(Default)]
pub struct FakeCacheClient {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl FakeCacheClient {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheClient for FakeCacheClient {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let data = self
            .data
            .read()
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(data.get(key).cloned())
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        _ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        data.insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        data.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let prefix = pattern.trim_end_matches('*');
        let mut data = self
            .data
            .write()
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        let to_remove: Vec<String> = data
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &to_remove {
            data.remove(key);
        }
        Ok(to_remove.len() as u64)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
