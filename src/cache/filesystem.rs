//! File System Cache Storage
//!
//! Information Hiding:
//! - File layout and JSON format hidden from users
//! - Partitions survive restarts, the way browser cache storage does
//!
//! Layout: `{base_path}/index.json` lists partition names in creation
//! order, and each partition lives in `{base_path}/{name}.json`.

use super::{CacheStorage, OrderedPartition};
use crate::core::http::{Request, Response};
use crate::error::CacheError;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;

const INDEX_FILE: &str = "index.json";

pub struct FileSystemCacheStorage {
    base_path: PathBuf,
    // Serializes read-modify-write cycles on the files.
    lock: Mutex<()>,
}

impl FileSystemCacheStorage {
    pub async fn new(base_path: PathBuf) -> Result<Self, CacheError> {
        fs::create_dir_all(&base_path).await?;
        Ok(Self {
            base_path,
            lock: Mutex::new(()),
        })
    }

    fn partition_path(&self, cache: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", cache))
    }

    async fn read_index(&self) -> Result<Vec<String>, CacheError> {
        let path = self.base_path.join(INDEX_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&json)?)
    }

    async fn write_index(&self, names: &[String]) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(names)?;
        fs::write(self.base_path.join(INDEX_FILE), json).await?;
        Ok(())
    }

    async fn read_partition(&self, cache: &str) -> Result<Option<OrderedPartition>, CacheError> {
        let path = self.partition_path(cache);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    async fn write_partition(&self, cache: &str, partition: &OrderedPartition) -> Result<(), CacheError> {
        let json = serde_json::to_string(partition)?;
        fs::write(self.partition_path(cache), json).await?;
        Ok(())
    }

    async fn ensure(&self, cache: &str) -> Result<OrderedPartition, CacheError> {
        if let Some(partition) = self.read_partition(cache).await? {
            return Ok(partition);
        }
        let mut names = self.read_index().await?;
        if !names.iter().any(|name| name == cache) {
            names.push(cache.to_string());
            self.write_index(&names).await?;
        }
        let partition = OrderedPartition::new();
        self.write_partition(cache, &partition).await?;
        tracing::debug!("[FileSystemCache] Created cache '{}'", cache);
        Ok(partition)
    }
}

#[async_trait]
impl CacheStorage for FileSystemCacheStorage {
    async fn open(&self, cache: &str) -> Result<(), CacheError> {
        let _guard = self.lock.lock().await;
        self.ensure(cache).await?;
        Ok(())
    }

    async fn put(&self, cache: &str, request: &Request, response: &Response) -> Result<(), CacheError> {
        let _guard = self.lock.lock().await;
        let mut partition = self.ensure(cache).await?;
        partition.insert(request.cache_key(), response.clone());
        self.write_partition(cache, &partition).await
    }

    async fn match_in(&self, cache: &str, request: &Request) -> Result<Option<Response>, CacheError> {
        let _guard = self.lock.lock().await;
        let key = request.cache_key();
        Ok(self
            .read_partition(cache)
            .await?
            .and_then(|partition| partition.get(&key).cloned()))
    }

    async fn match_any(&self, request: &Request) -> Result<Option<Response>, CacheError> {
        let _guard = self.lock.lock().await;
        let key = request.cache_key();
        for name in self.read_index().await? {
            if let Some(partition) = self.read_partition(&name).await? {
                if let Some(response) = partition.get(&key) {
                    return Ok(Some(response.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn keys(&self, cache: &str) -> Result<Vec<String>, CacheError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_partition(cache)
            .await?
            .map(|partition| partition.keys())
            .unwrap_or_default())
    }

    async fn delete_entry(&self, cache: &str, key: &str) -> Result<bool, CacheError> {
        let _guard = self.lock.lock().await;
        let Some(mut partition) = self.read_partition(cache).await? else {
            return Ok(false);
        };
        let removed = partition.remove(key);
        if removed {
            self.write_partition(cache, &partition).await?;
        }
        Ok(removed)
    }

    async fn delete_cache(&self, cache: &str) -> Result<bool, CacheError> {
        let _guard = self.lock.lock().await;
        let mut names = self.read_index().await?;
        let before = names.len();
        names.retain(|name| name != cache);
        let existed = names.len() != before;
        if existed {
            self.write_index(&names).await?;
        }

        let path = self.partition_path(cache);
        if path.exists() {
            fs::remove_file(&path).await?;
            tracing::debug!("[FileSystemCache] Deleted cache '{}' at {:?}", cache, path);
            return Ok(true);
        }
        Ok(existed)
    }

    async fn cache_names(&self) -> Result<Vec<String>, CacheError> {
        let _guard = self.lock.lock().await;
        self.read_index().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(path: &str) -> Request {
        Request::get(format!("https://shop.test{}", path).parse().unwrap())
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSystemCacheStorage::new(temp_dir.path().to_path_buf()).await.unwrap();

        let response = Response::new(200, "body").with_header("content-type", "text/plain");
        storage.put("dynamic", &request("/about"), &response).await.unwrap();

        let hit = storage.match_in("dynamic", &request("/about")).await.unwrap();
        assert_eq!(hit, Some(response));
        assert!(storage.match_in("dynamic", &request("/missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persistence_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().to_path_buf();

        {
            let storage = FileSystemCacheStorage::new(path.clone()).await.unwrap();
            storage.put("images", &request("/a.png"), &Response::new(200, "a")).await.unwrap();
            storage.put("images", &request("/b.png"), &Response::new(200, "b")).await.unwrap();
        }

        {
            let storage = FileSystemCacheStorage::new(path).await.unwrap();
            let keys = storage.keys("images").await.unwrap();
            assert_eq!(keys, vec![request("/a.png").cache_key(), request("/b.png").cache_key()]);
            assert!(storage.match_any(&request("/b.png")).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_delete_entry_and_cache() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSystemCacheStorage::new(temp_dir.path().to_path_buf()).await.unwrap();

        storage.put("api", &request("/x"), &Response::new(200, "x")).await.unwrap();
        storage.open("static").await.unwrap();

        assert!(storage.delete_entry("api", &request("/x").cache_key()).await.unwrap());
        assert!(!storage.delete_entry("api", &request("/x").cache_key()).await.unwrap());

        assert!(storage.delete_cache("api").await.unwrap());
        assert_eq!(storage.cache_names().await.unwrap(), vec!["static"]);
    }
}
