//! Worker event dispatcher
//!
//! One method per event kind. `ServiceWorker` holds no state between events
//! beyond configuration and handles to its dependencies, so a recycled
//! worker behaves the same as a long-lived one.

use super::lifecycle::{InstallReport, Lifecycle, WorkerState};
use super::messages::{CoreEvent, HostMessage};
use crate::cache::CacheStorage;
use crate::config::Settings;
use crate::core::classifier::RequestClassifier;
use crate::core::http::{Network, Request, Response};
use crate::error::WorkerError;
use crate::fetch::{FetchStrategies, OfflineFallback};
use crate::notify::{build_notification, handle_click, Notification, NotificationClick, PushPayload};
use crate::platform::{ClientBroadcaster, ClientWindows, Notifier};
use crate::store::{ChatMessage, OfflineStore, RecentListing, SyncStatus};
use crate::sync::{Outbox, SyncEngine, SyncReport};
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;

/// What the worker did with an intercepted request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Handled(Response),
    /// Not intercepted; the request goes to the network untouched.
    Passthrough,
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn install(&self) -> Result<InstallReport, WorkerError>;

    async fn activate(&self) -> Result<Vec<String>, WorkerError>;

    async fn fetch(&self, request: Request) -> Result<FetchOutcome, WorkerError>;

    /// Returns the reply event for request/response style messages.
    async fn message(&self, message: HostMessage) -> Result<Option<CoreEvent>, WorkerError>;

    async fn push(&self, payload: Vec<u8>) -> Result<Notification, WorkerError>;

    async fn notification_click(&self, click: NotificationClick) -> Result<Option<String>, WorkerError>;

    async fn sync(&self, tag: String) -> Result<SyncReport, WorkerError>;

    async fn periodic_sync(&self, tag: String) -> Result<SyncReport, WorkerError>;
}

/// Everything the worker reaches outside itself.
#[derive(Clone)]
pub struct WorkerDeps {
    pub cache: Arc<dyn CacheStorage>,
    pub store: Arc<dyn OfflineStore>,
    pub network: Arc<dyn Network>,
    pub windows: Arc<dyn ClientWindows>,
    pub notifier: Arc<dyn Notifier>,
    pub broadcaster: ClientBroadcaster,
}

pub struct ServiceWorker {
    settings: Arc<Settings>,
    origin: Url,
    classifier: Arc<RequestClassifier>,
    store: Arc<dyn OfflineStore>,
    windows: Arc<dyn ClientWindows>,
    notifier: Arc<dyn Notifier>,
    broadcaster: ClientBroadcaster,
    strategies: FetchStrategies,
    outbox: Outbox,
    sync_engine: SyncEngine,
    lifecycle: Lifecycle,
}

impl ServiceWorker {
    pub fn new(settings: Settings, deps: WorkerDeps) -> Result<Self, WorkerError> {
        let settings = Arc::new(settings);
        let origin = Url::parse(&settings.network.origin)
            .map_err(|e| WorkerError::InvalidOrigin(format!("{}: {}", settings.network.origin, e)))?;
        let classifier = Arc::new(RequestClassifier::new(&settings.routes)?);

        let fallback = OfflineFallback::new(
            &settings,
            origin.clone(),
            Arc::clone(&deps.cache),
            Arc::clone(&deps.store),
        )?;
        let strategies = FetchStrategies::new(
            Arc::clone(&settings),
            Arc::clone(&classifier),
            Arc::clone(&deps.cache),
            Arc::clone(&deps.network),
            fallback,
        );
        let outbox = Outbox::new(
            Arc::clone(&deps.network),
            Arc::clone(&deps.store),
            deps.broadcaster.clone(),
        );
        let sync_engine = SyncEngine::new(
            Arc::clone(&settings),
            Arc::clone(&deps.network),
            Arc::clone(&deps.store),
            deps.broadcaster.clone(),
        );
        let lifecycle = Lifecycle::new(
            Arc::clone(&settings),
            origin.clone(),
            Arc::clone(&deps.cache),
            Arc::clone(&deps.network),
            Arc::clone(&deps.windows),
        );

        Ok(Self {
            settings,
            origin,
            classifier,
            store: deps.store,
            windows: deps.windows,
            notifier: deps.notifier,
            broadcaster: deps.broadcaster,
            strategies,
            outbox,
            sync_engine,
            lifecycle,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.broadcaster.subscribe()
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.state().await
    }

    /// Wait for background revalidations started by earlier fetches.
    pub async fn settle(&self) {
        self.strategies.settle().await;
    }

    async fn cache_listing(&self, payload: serde_json::Value) {
        let now = chrono::Utc::now().timestamp_millis();
        let listing = match RecentListing::from_payload(payload, now) {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!("[ServiceWorker] Ignoring listing: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.put_recent_listing(&listing).await {
            tracing::error!("[ServiceWorker] Failed to cache listing {}: {}", listing.id, e);
            return;
        }
        if let Err(e) = self
            .store
            .trim_recent_listings(self.settings.store.recent_listings_max)
            .await
        {
            tracing::error!("[ServiceWorker] Failed to trim recent listings: {}", e);
        }
    }

    async fn cache_messages(&self, payloads: Vec<serde_json::Value>) {
        let messages: Vec<ChatMessage> = payloads
            .into_iter()
            .filter_map(|payload| match ChatMessage::from_payload(payload, SyncStatus::Synced) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::warn!("[ServiceWorker] Skipping message: {}", e);
                    None
                }
            })
            .collect();
        if messages.is_empty() {
            return;
        }
        match self.store.put_messages(&messages).await {
            Ok(()) => tracing::debug!("[ServiceWorker] Cached {} messages", messages.len()),
            Err(e) => tracing::error!("[ServiceWorker] Failed to cache messages: {}", e),
        }
    }
}

#[async_trait]
impl EventHandler for ServiceWorker {
    async fn install(&self) -> Result<InstallReport, WorkerError> {
        let report = self.lifecycle.install().await?;
        if report.skip_waiting {
            self.lifecycle.activate().await?;
        }
        Ok(report)
    }

    async fn activate(&self) -> Result<Vec<String>, WorkerError> {
        self.lifecycle.activate().await
    }

    async fn fetch(&self, request: Request) -> Result<FetchOutcome, WorkerError> {
        if !self.classifier.should_intercept(&request) {
            return Ok(FetchOutcome::Passthrough);
        }
        if self.classifier.is_message_send(&request) {
            return Ok(FetchOutcome::Handled(self.outbox.send(&request).await));
        }
        if !request.is_get() {
            return Ok(FetchOutcome::Passthrough);
        }
        self.strategies.handle(&request).await.map(FetchOutcome::Handled)
    }

    async fn message(&self, message: HostMessage) -> Result<Option<CoreEvent>, WorkerError> {
        match message {
            HostMessage::SkipWaiting => {
                if self.lifecycle.skip_waiting().await {
                    self.lifecycle.activate().await?;
                }
                Ok(None)
            }
            HostMessage::CacheListing(payload) => {
                self.cache_listing(payload).await;
                Ok(None)
            }
            HostMessage::CacheMessages(payloads) => {
                self.cache_messages(payloads).await;
                Ok(None)
            }
            HostMessage::GetCachedMessages { conversation_id } => {
                let messages = self
                    .store
                    .messages_for_conversation(&conversation_id)
                    .await
                    .unwrap_or_else(|e| {
                        tracing::error!("[ServiceWorker] Failed to read messages: {}", e);
                        Vec::new()
                    });
                Ok(Some(CoreEvent::CachedMessages {
                    conversation_id,
                    messages,
                }))
            }
            HostMessage::GetQueuedMessages => {
                let queued = self.store.queued_writes().await.unwrap_or_else(|e| {
                    tracing::error!("[ServiceWorker] Failed to read queue: {}", e);
                    Vec::new()
                });
                Ok(Some(CoreEvent::QueuedMessages(queued)))
            }
            HostMessage::ClearQueue => {
                match self.store.clear_queue().await {
                    Ok(removed) => tracing::info!("[ServiceWorker] Cleared {} queued writes", removed),
                    Err(e) => tracing::error!("[ServiceWorker] Failed to clear queue: {}", e),
                }
                Ok(None)
            }
            HostMessage::CacheVersionCheck => Ok(Some(CoreEvent::CacheVersion {
                version: self.settings.cache.version.clone(),
            })),
            HostMessage::SessionSet { key, value } => {
                let result = if value.is_null() {
                    self.store.session_delete(&key).await.map(|_| ())
                } else {
                    self.store.session_set(&key, &value).await
                };
                if let Err(e) = result {
                    tracing::error!("[ServiceWorker] Failed to write session '{}': {}", key, e);
                }
                Ok(None)
            }
            HostMessage::SessionGet { key } => {
                let value = self.store.session_get(&key).await.unwrap_or_else(|e| {
                    tracing::error!("[ServiceWorker] Failed to read session '{}': {}", key, e);
                    None
                });
                Ok(Some(CoreEvent::SessionValue { key, value }))
            }
        }
    }

    async fn push(&self, payload: Vec<u8>) -> Result<Notification, WorkerError> {
        let notification = build_notification(
            PushPayload::parse(&payload),
            &self.settings.notifications,
            chrono::Utc::now().timestamp_millis(),
        );
        self.notifier.show(&notification).await?;
        Ok(notification)
    }

    async fn notification_click(&self, click: NotificationClick) -> Result<Option<String>, WorkerError> {
        Ok(handle_click(&click, &self.origin, self.notifier.as_ref(), self.windows.as_ref()).await?)
    }

    async fn sync(&self, tag: String) -> Result<SyncReport, WorkerError> {
        Ok(self.sync_engine.handle(&tag).await)
    }

    async fn periodic_sync(&self, tag: String) -> Result<SyncReport, WorkerError> {
        tracing::debug!("[ServiceWorker] Periodic sync '{}'", tag);
        self.sync(tag).await
    }
}
