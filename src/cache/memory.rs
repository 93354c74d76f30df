//! In-Memory Cache Storage
//!
//! Information Hiding:
//! - Partition map and creation order hidden behind the async interface
//! - Suitable for testing and short-lived workers

use super::{CacheStorage, OrderedPartition};
use crate::core::http::{Request, Response};
use crate::error::CacheError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Partitions are lost when the process terminates
pub struct InMemoryCacheStorage {
    partitions: Arc<RwLock<Vec<(String, OrderedPartition)>>>,
}

impl InMemoryCacheStorage {
    pub fn new() -> Self {
        Self {
            partitions: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryCacheStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn find<'a>(
    partitions: &'a mut Vec<(String, OrderedPartition)>,
    cache: &str,
) -> &'a mut OrderedPartition {
    let index = match partitions.iter().position(|(name, _)| name == cache) {
        Some(index) => index,
        None => {
            partitions.push((cache.to_string(), OrderedPartition::new()));
            partitions.len() - 1
        }
    };
    &mut partitions[index].1
}

#[async_trait]
impl CacheStorage for InMemoryCacheStorage {
    async fn open(&self, cache: &str) -> Result<(), CacheError> {
        let mut partitions = self.partitions.write().await;
        find(&mut partitions, cache);
        Ok(())
    }

    async fn put(&self, cache: &str, request: &Request, response: &Response) -> Result<(), CacheError> {
        let mut partitions = self.partitions.write().await;
        find(&mut partitions, cache).insert(request.cache_key(), response.clone());
        tracing::debug!("[InMemoryCache] Stored '{}' in '{}'", request.cache_key(), cache);
        Ok(())
    }

    async fn match_in(&self, cache: &str, request: &Request) -> Result<Option<Response>, CacheError> {
        let partitions = self.partitions.read().await;
        let key = request.cache_key();
        Ok(partitions
            .iter()
            .find(|(name, _)| name == cache)
            .and_then(|(_, partition)| partition.get(&key).cloned()))
    }

    async fn match_any(&self, request: &Request) -> Result<Option<Response>, CacheError> {
        let partitions = self.partitions.read().await;
        let key = request.cache_key();
        Ok(partitions
            .iter()
            .find_map(|(_, partition)| partition.get(&key).cloned()))
    }

    async fn keys(&self, cache: &str) -> Result<Vec<String>, CacheError> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|(name, _)| name == cache)
            .map(|(_, partition)| partition.keys())
            .unwrap_or_default())
    }

    async fn delete_entry(&self, cache: &str, key: &str) -> Result<bool, CacheError> {
        let mut partitions = self.partitions.write().await;
        Ok(partitions
            .iter_mut()
            .find(|(name, _)| name == cache)
            .map(|(_, partition)| partition.remove(key))
            .unwrap_or(false))
    }

    async fn delete_cache(&self, cache: &str) -> Result<bool, CacheError> {
        let mut partitions = self.partitions.write().await;
        let before = partitions.len();
        partitions.retain(|(name, _)| name != cache);
        let deleted = partitions.len() != before;
        if deleted {
            tracing::debug!("[InMemoryCache] Deleted cache '{}'", cache);
        }
        Ok(deleted)
    }

    async fn cache_names(&self) -> Result<Vec<String>, CacheError> {
        let partitions = self.partitions.read().await;
        Ok(partitions.iter().map(|(name, _)| name.clone()).collect())
    }
}
