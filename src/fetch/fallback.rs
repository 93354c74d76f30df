//! Offline Fallback Generator
//!
//! Synthesizes responses when both the network and the exact cache entry
//! are unavailable: an offline page for navigations and offline-sourced
//! JSON for API reads.

use crate::cache::CacheStorage;
use crate::config::Settings;
use crate::core::http::{Request, Response};
use crate::error::WorkerError;
use crate::store::{ChatMessage, OfflineStore, RecentListing};
use regex::Regex;
use reqwest::Url;
use serde_json::{json, Value};
use std::sync::Arc;

pub const OFFLINE_HEADER: &str = "x-offline-response";

const OFFLINE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width, initial-scale=1"><title>Offline</title></head>
<body>
<main style="font-family:sans-serif;text-align:center;padding:3rem">
<h1>You're offline</h1>
<p>Check your connection. Anything you send will be delivered when you're back online.</p>
<button onclick="location.reload()">Try again</button>
</main>
</body>
</html>"#;

pub struct OfflineFallback {
    cache: Arc<dyn CacheStorage>,
    store: Arc<dyn OfflineStore>,
    origin: Url,
    offline_page: String,
    app_shell: String,
    listings_path: Regex,
    messages_path: Regex,
}

impl OfflineFallback {
    pub fn new(
        settings: &Settings,
        origin: Url,
        cache: Arc<dyn CacheStorage>,
        store: Arc<dyn OfflineStore>,
    ) -> Result<Self, WorkerError> {
        Ok(Self {
            cache,
            store,
            origin,
            offline_page: settings.cache.offline_page.clone(),
            app_shell: settings.cache.app_shell.clone(),
            listings_path: Regex::new(&settings.routes.listings_path_pattern)?,
            messages_path: Regex::new(&settings.routes.messages_path_pattern)?,
        })
    }

    /// Cached offline page, else cached app shell, else a built-in 503 page.
    pub async fn offline_page(&self) -> Response {
        for path in [&self.offline_page, &self.app_shell] {
            let Ok(url) = self.origin.join(path) else {
                continue;
            };
            match self.cache.match_any(&Request::get(url)).await {
                Ok(Some(response)) => return response,
                Ok(None) => {}
                Err(e) => tracing::warn!("[OfflineFallback] Cache lookup for '{}' failed: {}", path, e),
            }
        }
        Response::html(503, OFFLINE_HTML)
    }

    /// Serve listings or messages from the durable store, else a JSON error.
    pub async fn offline_api_response(&self, request: &Request) -> Response {
        let path = request.url.path();

        if self.listings_path.is_match(path) {
            let listings = self.store.recent_listings().await.unwrap_or_else(|e| {
                tracing::error!("[OfflineFallback] Failed to read recent listings: {}", e);
                Vec::new()
            });
            let body = Value::Array(listings.iter().map(RecentListing::to_value).collect());
            return Response::json(200, &body).with_header(OFFLINE_HEADER, "true");
        }

        if self.messages_path.is_match(path) {
            let messages = self.store.all_messages().await.unwrap_or_else(|e| {
                tracing::error!("[OfflineFallback] Failed to read cached messages: {}", e);
                Vec::new()
            });
            let body = Value::Array(messages.iter().map(ChatMessage::to_value).collect());
            return Response::json(200, &body).with_header(OFFLINE_HEADER, "true");
        }

        Response::json(
            503,
            &json!({
                "error": "offline",
                "message": "You are offline. Your data will sync when the connection is restored.",
                "offline": true,
            }),
        )
        .with_header(OFFLINE_HEADER, "true")
    }
}
