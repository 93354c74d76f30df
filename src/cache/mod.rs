//! HTTP Cache Tiers
//!
//! Information Hiding:
//! - Storage backend (memory, filesystem) hidden behind trait
//! - Partition ordering lives in `OrderedPartition`, so eviction is a
//!   well-defined "drop the oldest N keys" regardless of backend

use crate::core::http::{Request, Response};
use crate::error::CacheError;
use async_trait::async_trait;

pub mod filesystem;
pub mod memory;
pub mod partition;

pub use filesystem::FileSystemCacheStorage;
pub use memory::InMemoryCacheStorage;
pub use partition::OrderedPartition;

/// Named cache partitions holding request/response pairs
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the partition if it does not exist yet.
    async fn open(&self, cache: &str) -> Result<(), CacheError>;

    /// Store a response under the request's identity, creating the partition if needed.
    async fn put(&self, cache: &str, request: &Request, response: &Response) -> Result<(), CacheError>;

    /// Look up a request in one partition.
    async fn match_in(&self, cache: &str, request: &Request) -> Result<Option<Response>, CacheError>;

    /// Look up a request across all partitions, in partition creation order.
    async fn match_any(&self, request: &Request) -> Result<Option<Response>, CacheError>;

    /// Keys of a partition, oldest first. Empty if the partition is missing.
    async fn keys(&self, cache: &str) -> Result<Vec<String>, CacheError>;

    async fn delete_entry(&self, cache: &str, key: &str) -> Result<bool, CacheError>;

    async fn delete_cache(&self, cache: &str) -> Result<bool, CacheError>;

    async fn cache_names(&self) -> Result<Vec<String>, CacheError>;
}

/// Delete the oldest entries of `cache` until at most `max_items` remain.
///
/// Strict FIFO by insertion order. Not atomic with concurrent writers: an
/// entry written between the key listing and the deletes is left alone, so
/// the partition may briefly exceed the ceiling.
pub async fn trim_cache(
    storage: &dyn CacheStorage,
    cache: &str,
    max_items: usize,
) -> Result<usize, CacheError> {
    let keys = storage.keys(cache).await?;
    if keys.len() <= max_items {
        return Ok(0);
    }

    let excess = keys.len() - max_items;
    let mut evicted = 0;
    for key in keys.iter().take(excess) {
        if storage.delete_entry(cache, key).await? {
            evicted += 1;
        }
    }

    tracing::debug!("[Cache] Evicted {} entries from '{}'", evicted, cache);
    Ok(evicted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(n: usize) -> Request {
        Request::get(format!("https://shop.test/img/{}.png", n).parse().unwrap())
    }

    #[tokio::test]
    async fn test_trim_is_fifo() {
        let storage = InMemoryCacheStorage::new();
        let ceiling = 5;
        let extra = 3;

        for n in 0..ceiling + extra {
            storage
                .put("images", &request(n), &Response::new(200, n.to_string()))
                .await
                .unwrap();
            trim_cache(&storage, "images", ceiling).await.unwrap();
        }

        let keys = storage.keys("images").await.unwrap();
        assert_eq!(keys.len(), ceiling);
        let expected: Vec<String> = (extra..ceiling + extra).map(|n| request(n).cache_key()).collect();
        assert_eq!(keys, expected);
    }

    #[tokio::test]
    async fn test_trim_is_not_lru() {
        let storage = InMemoryCacheStorage::new();

        for n in 0..3 {
            storage.put("images", &request(n), &Response::new(200, "x")).await.unwrap();
        }
        // Reading the oldest entry does not protect it.
        for _ in 0..5 {
            assert!(storage.match_in("images", &request(0)).await.unwrap().is_some());
        }
        storage.put("images", &request(3), &Response::new(200, "x")).await.unwrap();
        trim_cache(&storage, "images", 3).await.unwrap();

        assert!(storage.match_in("images", &request(0)).await.unwrap().is_none());
        assert!(storage.match_in("images", &request(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_trim_under_ceiling_is_noop() {
        let storage = InMemoryCacheStorage::new();
        storage.put("api", &request(1), &Response::new(200, "x")).await.unwrap();

        assert_eq!(trim_cache(&storage, "api", 30).await.unwrap(), 0);
        assert_eq!(trim_cache(&storage, "missing", 30).await.unwrap(), 0);
    }
}
