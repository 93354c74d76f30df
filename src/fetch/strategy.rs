//! Fetch Strategy Engine
//!
//! Information Hiding:
//! - Which strategy and which partition serve a request is decided here
//!   from the request category alone
//! - Cache failures degrade to misses; network failures degrade to cached
//!   copies or synthesized offline responses where the policy allows
//!
//! Concurrent requests for the same uncached URL may both miss, both fetch
//! and both write. The second write overwrites the first.

use super::fallback::OfflineFallback;
use crate::cache::{trim_cache, CacheStorage};
use crate::config::{CacheTier, Settings};
use crate::core::classifier::{RequestCategory, RequestClassifier};
use crate::core::http::{Network, Request, Response};
use crate::error::{NetworkError, WorkerError};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

/// The dispatch table: strategy and partition per request category.
pub fn route(category: RequestCategory) -> (Strategy, CacheTier) {
    match category {
        RequestCategory::Navigation => (Strategy::NetworkFirst, CacheTier::Dynamic),
        RequestCategory::Static => (Strategy::CacheFirst, CacheTier::Static),
        RequestCategory::Image => (Strategy::CacheFirst, CacheTier::Images),
        RequestCategory::Api => (Strategy::NetworkFirst, CacheTier::Api),
        RequestCategory::Other => (Strategy::StaleWhileRevalidate, CacheTier::Dynamic),
    }
}

/// Write a response into a partition and apply its ceiling. Failures are
/// logged; the response is still served.
async fn store_response(
    cache: &dyn CacheStorage,
    cache_name: &str,
    request: &Request,
    response: &Response,
    max_items: Option<usize>,
) {
    if !request.is_get() || !response.is_success() {
        return;
    }
    if let Err(e) = cache.put(cache_name, request, response).await {
        tracing::warn!("[FetchStrategies] Failed to cache '{}': {}", request.url, e);
        return;
    }
    if let Some(max) = max_items {
        if let Err(e) = trim_cache(cache, cache_name, max).await {
            tracing::warn!("[FetchStrategies] Failed to trim '{}': {}", cache_name, e);
        }
    }
}

async fn fetch_and_store(
    cache: &dyn CacheStorage,
    network: &dyn Network,
    request: &Request,
    cache_name: &str,
    max_items: Option<usize>,
) -> Result<Response, NetworkError> {
    let response = network.fetch(request).await?;
    store_response(cache, cache_name, request, &response, max_items).await;
    Ok(response)
}

pub struct FetchStrategies {
    settings: Arc<Settings>,
    classifier: Arc<RequestClassifier>,
    cache: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    fallback: OfflineFallback,
    revalidations: Mutex<Vec<JoinHandle<()>>>,
}

impl FetchStrategies {
    pub fn new(
        settings: Arc<Settings>,
        classifier: Arc<RequestClassifier>,
        cache: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        fallback: OfflineFallback,
    ) -> Self {
        Self {
            settings,
            classifier,
            cache,
            network,
            fallback,
            revalidations: Mutex::new(Vec::new()),
        }
    }

    /// Serve an intercepted GET according to the dispatch table.
    pub async fn handle(&self, request: &Request) -> Result<Response, WorkerError> {
        let category = self.classifier.classify(request);
        let (strategy, tier) = route(category);
        let cache_name = self.settings.cache_name(tier);
        let max_items = self.settings.tier_limit(tier);

        tracing::debug!(
            "[FetchStrategies] {} -> {:?} via {:?} into '{}'",
            request.url,
            category,
            strategy,
            cache_name
        );

        match strategy {
            Strategy::CacheFirst => self.cache_first(request, &cache_name, max_items).await,
            Strategy::NetworkFirst => self.network_first(request, &cache_name, max_items).await,
            Strategy::StaleWhileRevalidate => {
                self.stale_while_revalidate(request, &cache_name, max_items).await
            }
        }
    }

    async fn lookup(&self, request: &Request) -> Option<Response> {
        match self.cache.match_any(request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!("[FetchStrategies] Cache lookup failed for '{}': {}", request.url, e);
                None
            }
        }
    }

    pub async fn cache_first(
        &self,
        request: &Request,
        cache_name: &str,
        max_items: Option<usize>,
    ) -> Result<Response, WorkerError> {
        if let Some(hit) = self.lookup(request).await {
            return Ok(hit);
        }

        match fetch_and_store(self.cache.as_ref(), self.network.as_ref(), request, cache_name, max_items).await {
            Ok(response) => Ok(response),
            Err(e) if self.classifier.is_navigation(request) => {
                tracing::warn!("[FetchStrategies] Navigation failed ({}), serving offline page", e);
                Ok(self.fallback.offline_page().await)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn network_first(
        &self,
        request: &Request,
        cache_name: &str,
        max_items: Option<usize>,
    ) -> Result<Response, WorkerError> {
        let error = match fetch_and_store(self.cache.as_ref(), self.network.as_ref(), request, cache_name, max_items).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        tracing::warn!("[FetchStrategies] Network failed for '{}': {}", request.url, error);

        if let Some(hit) = self.lookup(request).await {
            return Ok(hit);
        }
        if self.classifier.is_navigation(request) {
            return Ok(self.fallback.offline_page().await);
        }
        if self.classifier.is_api(&request.url) {
            return Ok(self.fallback.offline_api_response(request).await);
        }
        Err(error.into())
    }

    /// Serve the cached copy immediately and refresh it in the background;
    /// with no cached copy, wait for the network.
    pub async fn stale_while_revalidate(
        &self,
        request: &Request,
        cache_name: &str,
        max_items: Option<usize>,
    ) -> Result<Response, WorkerError> {
        let Some(hit) = self.lookup(request).await else {
            return fetch_and_store(self.cache.as_ref(), self.network.as_ref(), request, cache_name, max_items)
                .await
                .map_err(WorkerError::from);
        };

        let cache = Arc::clone(&self.cache);
        let network = Arc::clone(&self.network);
        let request = request.clone();
        let cache_name = cache_name.to_string();
        let handle = tokio::spawn(async move {
            if let Err(e) =
                fetch_and_store(cache.as_ref(), network.as_ref(), &request, &cache_name, max_items).await
            {
                tracing::debug!("[FetchStrategies] Revalidation of '{}' failed: {}", request.url, e);
            }
        });

        if let Ok(mut pending) = self.revalidations.lock() {
            pending.retain(|h| !h.is_finished());
            pending.push(handle);
        }
        Ok(hit)
    }

    /// Wait for every background revalidation started so far.
    pub async fn settle(&self) {
        let pending: Vec<JoinHandle<()>> = match self.revalidations.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return,
        };
        for handle in pending {
            if let Err(e) = handle.await {
                tracing::warn!("[FetchStrategies] Revalidation task failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheStorage;
    use crate::store::InMemoryOfflineStore;
    use async_trait::async_trait;
    use reqwest::Url;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed body per call, or fails when `online` is false.
    struct ScriptedNetwork {
        online: std::sync::atomic::AtomicBool,
        calls: AtomicUsize,
    }

    impl ScriptedNetwork {
        fn new(online: bool) -> Self {
            Self {
                online: std::sync::atomic::AtomicBool::new(online),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Network for ScriptedNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.online.load(Ordering::SeqCst) {
                return Err(NetworkError::Transport("offline".to_string()));
            }
            Ok(Response::new(200, format!("{} #{}", request.url.path(), call)))
        }
    }

    fn strategies(network: Arc<ScriptedNetwork>) -> (FetchStrategies, Arc<InMemoryCacheStorage>) {
        let settings = Arc::new(Settings::default());
        let classifier = Arc::new(RequestClassifier::new(&settings.routes).unwrap());
        let cache = Arc::new(InMemoryCacheStorage::new());
        let store = Arc::new(InMemoryOfflineStore::new());
        let origin = Url::parse(&settings.network.origin).unwrap();
        let fallback = OfflineFallback::new(&settings, origin, cache.clone(), store).unwrap();
        (
            FetchStrategies::new(settings, classifier, cache.clone(), network, fallback),
            cache,
        )
    }

    fn get(url: &str) -> Request {
        Request::get(url.parse().unwrap())
    }

    #[test]
    fn test_dispatch_table() {
        assert_eq!(route(RequestCategory::Navigation), (Strategy::NetworkFirst, CacheTier::Dynamic));
        assert_eq!(route(RequestCategory::Static), (Strategy::CacheFirst, CacheTier::Static));
        assert_eq!(route(RequestCategory::Image), (Strategy::CacheFirst, CacheTier::Images));
        assert_eq!(route(RequestCategory::Api), (Strategy::NetworkFirst, CacheTier::Api));
        assert_eq!(
            route(RequestCategory::Other),
            (Strategy::StaleWhileRevalidate, CacheTier::Dynamic)
        );
    }

    #[tokio::test]
    async fn test_cache_first_serves_second_request_from_cache() {
        let network = Arc::new(ScriptedNetwork::new(true));
        let (strategies, _) = strategies(network.clone());
        let request = get("https://shop.test/img/chair.png");

        let first = strategies.handle(&request).await.unwrap();
        let second = strategies.handle(&request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(network.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_first_propagates_non_navigation_failure() {
        let network = Arc::new(ScriptedNetwork::new(false));
        let (strategies, _) = strategies(network);

        let result = strategies.handle(&get("https://shop.test/img/missing.png")).await;
        assert!(matches!(result, Err(WorkerError::Network(_))));
    }

    #[tokio::test]
    async fn test_cache_first_does_not_cache_errors() {
        struct NotFound;
        #[async_trait]
        impl Network for NotFound {
            async fn fetch(&self, _request: &Request) -> Result<Response, NetworkError> {
                Ok(Response::new(404, "nope"))
            }
        }

        let settings = Arc::new(Settings::default());
        let classifier = Arc::new(RequestClassifier::new(&settings.routes).unwrap());
        let cache = Arc::new(InMemoryCacheStorage::new());
        let origin = Url::parse(&settings.network.origin).unwrap();
        let fallback =
            OfflineFallback::new(&settings, origin, cache.clone(), Arc::new(InMemoryOfflineStore::new())).unwrap();
        let strategies = FetchStrategies::new(settings, classifier, cache.clone(), Arc::new(NotFound), fallback);

        let response = strategies.handle(&get("https://shop.test/app.js")).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(cache.keys("marketplace-static-v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cache() {
        let network = Arc::new(ScriptedNetwork::new(true));
        let (strategies, _) = strategies(network.clone());
        let request = get("https://abc.supabase.co/rest/v1/categories");

        let fresh = strategies.handle(&request).await.unwrap();
        network.online.store(false, Ordering::SeqCst);
        let offline = strategies.handle(&request).await.unwrap();

        assert_eq!(fresh, offline);
    }

    #[tokio::test]
    async fn test_network_first_navigation_offline_page() {
        let network = Arc::new(ScriptedNetwork::new(false));
        let (strategies, _) = strategies(network);

        let page = strategies
            .handle(&Request::navigate("https://shop.test/listings/9".parse().unwrap()))
            .await
            .unwrap();
        assert_eq!(page.status, 503);
        assert!(page.text().contains("offline"));
    }

    #[tokio::test]
    async fn test_api_ceiling_applied() {
        let network = Arc::new(ScriptedNetwork::new(true));
        let (strategies, cache) = strategies(network);

        for n in 0..35 {
            strategies
                .handle(&get(&format!("https://abc.supabase.co/rest/v1/items?page={}", n)))
                .await
                .unwrap();
        }

        let keys = cache.keys("marketplace-api-v1").await.unwrap();
        assert_eq!(keys.len(), 30);
        assert!(keys[0].ends_with("page=5"));
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_serves_stale_then_refreshes() {
        let network = Arc::new(ScriptedNetwork::new(true));
        let (strategies, cache) = strategies(network.clone());
        let request = get("https://shop.test/robots.txt");

        let first = strategies.handle(&request).await.unwrap();
        assert_eq!(first.text(), "/robots.txt #1");

        let second = strategies.handle(&request).await.unwrap();
        assert_eq!(second.text(), "/robots.txt #1");
        strategies.settle().await;

        let refreshed = cache.match_in("marketplace-dynamic-v1", &request).await.unwrap().unwrap();
        assert_eq!(refreshed.text(), "/robots.txt #2");
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_ignores_failed_refresh() {
        let network = Arc::new(ScriptedNetwork::new(true));
        let (strategies, _) = strategies(network.clone());
        let request = get("https://shop.test/robots.txt");

        strategies.handle(&request).await.unwrap();
        network.online.store(false, Ordering::SeqCst);

        let stale = strategies.handle(&request).await.unwrap();
        strategies.settle().await;
        assert_eq!(stale.text(), "/robots.txt #1");
    }

    #[tokio::test]
    async fn test_concurrent_cache_first_misses_may_both_fetch() {
        // Known race: both requests can miss before either writes. Every
        // write stores the same resource, so the cache ends up with one entry.
        let network = Arc::new(ScriptedNetwork::new(true));
        let (strategies, cache) = strategies(network.clone());
        let request = get("https://shop.test/img/race.png");

        let (a, b) = tokio::join!(strategies.handle(&request), strategies.handle(&request));
        assert!(a.is_ok() && b.is_ok());

        let calls = network.calls.load(Ordering::SeqCst);
        assert!((1..=2).contains(&calls));
        assert_eq!(cache.keys("marketplace-images-v1").await.unwrap().len(), 1);
    }
}
