//! Cache-aside read helper shared by the concrete store adapters
//! (spec.md §4.1 "Cached Repository"). Per spec.md §7, a cache failure
//! on the read or write side is never surfaced to the caller — it is
//! treated exactly like a miss and logged at debug level.

use memstack_core::CacheClient;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Look up `key` in `cache`; on a hit, deserialize and return it. On a
/// miss (or any cache error, which is treated as a miss), call
/// `load` to fetch the authoritative value, then best-effort write it
/// back to `cache` with `ttl`.
pub async fn cached_read<T, L, Fut, E>(
    cache: &dyn CacheClient,
    key: &str,
    ttl: Option<Duration>,
    load: L,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    L: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    match cache.get(key).await {
        Ok(Some(raw)) => match serde_json::from_slice::<T>(&raw) {
            Ok(value) => return Ok(value),
            Err(e) => tracing::debug!(key, error = %e, "cache hit failed to deserialize, treating as miss"),
        },
        Ok(None) => {}
        Err(e) => tracing::debug!(key, error = %e, "cache read failed, treating as miss"),
    }

    let value = load().await?;

    if let Ok(serialized) = serde_json::to_vec(&value) {
        if let Err(e) = cache.set(key, serialized, ttl).await {
            tracing::debug!(key, error = %e, "cache write-back failed, ignoring");
        }
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memstack_core::test_support::FakeCacheClient;

    #[tokio::test]
    async fn miss_loads_and_populates_cache() {
        let cache = FakeCacheClient::new();
        let mut calls = 0;
        let value: Result<String, std::convert::Infallible> =
            cached_read(&cache, "k", None, || {
                calls += 1;
                async { Ok("hello".to_owned()) }
            })
            .await;
        assert_eq!(value.unwrap(), "hello");
        assert_eq!(calls, 1);

        let cached = cache.get("k").await.unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn hit_skips_load() {
        let cache = FakeCacheClient::new();
        cache
            .set("k", serde_json::to_vec("cached").unwrap(), None)
            .await
            .unwrap();

        let value: Result<String, std::convert::Infallible> = cached_read(&cache, "k", None, || async {
            panic!("load should not run on a cache hit");
        })
        .await;
        assert_eq!(value.unwrap(), "cached");
    }
}
