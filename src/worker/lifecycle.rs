//! Lifecycle Manager
//!
//! installing -> waiting -> active(version). A new version repeats the
//! cycle; activation removes every partition left by older versions.

use crate::cache::CacheStorage;
use crate::config::{CacheTier, Settings};
use crate::core::http::{Network, Request};
use crate::error::WorkerError;
use crate::platform::ClientWindows;
use futures::future::join_all;
use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Waiting,
    Active { version: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<String>,
    /// True when a skip-waiting request was pending, so the install goes
    /// straight on to activation.
    pub skip_waiting: bool,
}

pub struct Lifecycle {
    settings: Arc<Settings>,
    origin: Url,
    cache: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    windows: Arc<dyn ClientWindows>,
    state: RwLock<WorkerState>,
    skip_waiting: RwLock<bool>,
}

impl Lifecycle {
    pub fn new(
        settings: Arc<Settings>,
        origin: Url,
        cache: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        windows: Arc<dyn ClientWindows>,
    ) -> Self {
        Self {
            settings,
            origin,
            cache,
            network,
            windows,
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: RwLock::new(false),
        }
    }

    pub async fn state(&self) -> WorkerState {
        self.state.read().await.clone()
    }

    /// Open the static partition and precache the app shell. Individual
    /// asset failures are logged and do not fail the install.
    pub async fn install(&self) -> Result<InstallReport, WorkerError> {
        *self.state.write().await = WorkerState::Installing;

        let cache_name = self.settings.cache_name(CacheTier::Static);
        self.cache.open(&cache_name).await?;

        let fetches = self
            .settings
            .cache
            .precache
            .iter()
            .map(|path| self.precache_one(&cache_name, path));
        let results = join_all(fetches).await;

        let mut report = InstallReport::default();
        for (path, ok) in self.settings.cache.precache.iter().zip(results) {
            if ok {
                report.cached.push(path.clone());
            } else {
                report.failed.push(path.clone());
            }
        }
        let mut state = self.state.write().await;
        report.skip_waiting = *self.skip_waiting.read().await;
        *state = WorkerState::Waiting;
        drop(state);

        tracing::info!(
            "[Lifecycle] Installed {}: {} precached, {} failed",
            self.settings.cache.version,
            report.cached.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn precache_one(&self, cache_name: &str, path: &str) -> bool {
        let url = match self.origin.join(path) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("[Lifecycle] Bad precache path '{}': {}", path, e);
                return false;
            }
        };
        let request = Request::get(url);
        match self.network.fetch(&request).await {
            Ok(response) if response.is_success() => match self.cache.put(cache_name, &request, &response).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("[Lifecycle] Failed to store '{}': {}", path, e);
                    false
                }
            },
            Ok(response) => {
                tracing::warn!("[Lifecycle] Precache of '{}' returned {}", path, response.status);
                false
            }
            Err(e) => {
                tracing::warn!("[Lifecycle] Precache of '{}' failed: {}", path, e);
                false
            }
        }
    }

    /// Delete partitions from older versions and take control of open windows.
    /// Returns the names of the deleted partitions.
    pub async fn activate(&self) -> Result<Vec<String>, WorkerError> {
        let current = self.settings.current_cache_names();
        let own_prefix = format!("{}-", self.settings.cache.prefix);

        let mut removed = Vec::new();
        for name in self.cache.cache_names().await? {
            if name.starts_with(&own_prefix) && !current.contains(&name) {
                if self.cache.delete_cache(&name).await? {
                    tracing::info!("[Lifecycle] Deleted old cache '{}'", name);
                    removed.push(name);
                }
            }
        }

        self.windows.claim().await?;
        *self.skip_waiting.write().await = false;
        *self.state.write().await = WorkerState::Active {
            version: self.settings.cache.version.clone(),
        };
        tracing::info!("[Lifecycle] Active at {}", self.settings.cache.version);
        Ok(removed)
    }

    /// Request activation without waiting for old windows to close.
    /// Returns true if the worker is waiting and should activate now. An
    /// active worker ignores the request.
    pub async fn skip_waiting(&self) -> bool {
        let state = self.state.read().await;
        if let WorkerState::Active { version } = &*state {
            tracing::debug!("[Lifecycle] Already active at {}, ignoring skip-waiting", version);
            return false;
        }
        *self.skip_waiting.write().await = true;
        matches!(*state, WorkerState::Waiting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheStorage;
    use crate::core::http::Response;
    use crate::error::NetworkError;
    use crate::platform::HeadlessPlatform;
    use async_trait::async_trait;

    /// Serves every path except the icons.
    struct FlakyOrigin;

    #[async_trait]
    impl Network for FlakyOrigin {
        async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
            if request.url.path().starts_with("/icons/") {
                Err(NetworkError::Transport("unreachable".to_string()))
            } else {
                Ok(Response::new(200, request.url.path().to_string()))
            }
        }
    }

    fn lifecycle(settings: Settings, cache: Arc<InMemoryCacheStorage>, platform: HeadlessPlatform) -> Lifecycle {
        let origin = Url::parse(&settings.network.origin).unwrap();
        Lifecycle::new(
            Arc::new(settings),
            origin,
            cache,
            Arc::new(FlakyOrigin),
            Arc::new(platform),
        )
    }

    #[tokio::test]
    async fn test_install_is_best_effort() {
        let cache = Arc::new(InMemoryCacheStorage::new());
        let lc = lifecycle(Settings::default(), cache.clone(), HeadlessPlatform::new());

        let report = lc.install().await.unwrap();

        assert!(report.cached.contains(&"/offline.html".to_string()));
        assert!(report.failed.iter().all(|p| p.starts_with("/icons/")));
        assert!(!report.failed.is_empty());
        assert_eq!(lc.state().await, WorkerState::Waiting);

        let keys = cache.keys("marketplace-static-v1").await.unwrap();
        assert_eq!(keys.len(), report.cached.len());
    }

    #[tokio::test]
    async fn test_activate_removes_only_old_versions() {
        let cache = Arc::new(InMemoryCacheStorage::new());
        for name in ["marketplace-static-v1", "marketplace-images-v1", "other-app-v1"] {
            cache.open(name).await.unwrap();
        }

        let mut settings = Settings::default();
        settings.cache.version = "v2".to_string();
        let platform = HeadlessPlatform::new();
        let lc = lifecycle(settings, cache.clone(), platform.clone());
        lc.install().await.unwrap();

        let mut removed = lc.activate().await.unwrap();
        removed.sort();

        assert_eq!(removed, vec!["marketplace-images-v1", "marketplace-static-v1"]);
        let names = cache.cache_names().await.unwrap();
        assert!(names.contains(&"other-app-v1".to_string()));
        assert!(names.contains(&"marketplace-static-v2".to_string()));
        assert!(platform.is_claimed().await);
        assert_eq!(
            lc.state().await,
            WorkerState::Active {
                version: "v2".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_skip_waiting_only_activates_waiting_worker() {
        let lc = lifecycle(
            Settings::default(),
            Arc::new(InMemoryCacheStorage::new()),
            HeadlessPlatform::new(),
        );
        assert!(!lc.skip_waiting().await);

        let report = lc.install().await.unwrap();
        assert!(report.skip_waiting);
        assert!(lc.skip_waiting().await);
    }

    #[tokio::test]
    async fn test_skip_waiting_ignored_once_active() {
        let lc = lifecycle(
            Settings::default(),
            Arc::new(InMemoryCacheStorage::new()),
            HeadlessPlatform::new(),
        );
        lc.install().await.unwrap();
        lc.activate().await.unwrap();

        assert!(!lc.skip_waiting().await);

        let report = lc.install().await.unwrap();
        assert!(!report.skip_waiting);
        assert_eq!(lc.state().await, WorkerState::Waiting);
    }
}
