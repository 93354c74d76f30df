//! Replays queued writes on a background or periodic sync trigger.
//!
//! Delivery is at-least-once: a record is deleted only after the server
//! acknowledged the replay, so a lost acknowledgment can cause a duplicate
//! send on the next trigger. Failed replays stay queued with no retry cap.

use crate::config::Settings;
use crate::core::http::{Network, Request};
use crate::platform::ClientBroadcaster;
use crate::store::{ChatMessage, OfflineStore, QueuedWrite, SyncStatus};
use crate::worker::messages::CoreEvent;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub tag: String,
    pub replayed: usize,
    pub pending: usize,
    pub trimmed: usize,
}

pub struct SyncEngine {
    settings: Arc<Settings>,
    network: Arc<dyn Network>,
    store: Arc<dyn OfflineStore>,
    broadcaster: ClientBroadcaster,
}

impl SyncEngine {
    pub fn new(
        settings: Arc<Settings>,
        network: Arc<dyn Network>,
        store: Arc<dyn OfflineStore>,
        broadcaster: ClientBroadcaster,
    ) -> Self {
        Self {
            settings,
            network,
            store,
            broadcaster,
        }
    }

    pub async fn handle(&self, tag: &str) -> SyncReport {
        let mut report = SyncReport {
            tag: tag.to_string(),
            ..SyncReport::default()
        };

        if tag == self.settings.sync.message_tag {
            let (replayed, pending) = self.replay_queue().await;
            report.replayed = replayed;
            report.pending = pending;
        } else if tag == self.settings.sync.listings_tag {
            report.trimmed = self.trim_listings().await;
        } else {
            tracing::warn!("[SyncEngine] Ignoring unknown sync tag '{}'", tag);
            return report;
        }

        self.broadcaster.publish(CoreEvent::SyncComplete {
            tag: report.tag.clone(),
            replayed: report.replayed,
            pending: report.pending,
        });
        tracing::info!(
            "[SyncEngine] '{}' complete: {} replayed, {} pending, {} trimmed",
            tag,
            report.replayed,
            report.pending,
            report.trimmed
        );
        report
    }

    /// Returns (replayed, still pending).
    async fn replay_queue(&self) -> (usize, usize) {
        let queued = match self.store.queued_writes().await {
            Ok(queued) => queued,
            Err(e) => {
                tracing::error!("[SyncEngine] Failed to read queue: {}", e);
                return (0, 0);
            }
        };

        let mut replayed = 0;
        let mut pending = 0;
        for record in &queued {
            if self.replay(record).await {
                replayed += 1;
            } else {
                pending += 1;
            }
        }
        (replayed, pending)
    }

    async fn replay(&self, record: &QueuedWrite) -> bool {
        let url = match record.url.parse() {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("[SyncEngine] Queued write {} has invalid url: {}", record.id, e);
                return false;
            }
        };
        let body = match serde_json::to_vec(&record.body) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("[SyncEngine] Queued write {} has unserializable body: {}", record.id, e);
                return false;
            }
        };

        let mut request = Request::new(&record.method, url).with_body(body);
        for (name, value) in &record.headers {
            request = request.with_header(name, value);
        }

        match self.network.fetch(&request).await {
            Ok(response) if response.is_success() => {}
            Ok(response) => {
                tracing::warn!(
                    "[SyncEngine] Replay of {} rejected with status {}",
                    record.id,
                    response.status
                );
                return false;
            }
            Err(e) => {
                tracing::debug!("[SyncEngine] Replay of {} failed: {}", record.id, e);
                return false;
            }
        }

        if let Err(e) = self.store.delete_queued_write(record.id).await {
            tracing::error!("[SyncEngine] Replayed {} but could not dequeue it: {}", record.id, e);
        }
        if let Ok(message) = ChatMessage::from_payload(record.body.clone(), SyncStatus::Synced) {
            if let Err(e) = self.store.put_messages(&[message]).await {
                tracing::warn!("[SyncEngine] Failed to mark message synced: {}", e);
            }
        }
        true
    }

    async fn trim_listings(&self) -> usize {
        match self
            .store
            .trim_recent_listings(self.settings.store.recent_listings_max)
            .await
        {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!("[SyncEngine] Failed to trim recent listings: {}", e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::http::Response;
    use crate::error::NetworkError;
    use crate::store::{InMemoryOfflineStore, QueuedWriteDraft, RecentListing};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Toggle {
        online: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Network for Toggle {
        async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.method, "POST");
            assert_eq!(request.header("authorization"), Some("Bearer t"));
            if self.online.load(Ordering::SeqCst) {
                Ok(Response::new(201, "{}"))
            } else {
                Err(NetworkError::Transport("offline".to_string()))
            }
        }
    }

    fn engine(online: bool) -> (SyncEngine, Arc<InMemoryOfflineStore>, Arc<Toggle>) {
        let network = Arc::new(Toggle {
            online: AtomicBool::new(online),
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(InMemoryOfflineStore::new());
        let engine = SyncEngine::new(
            Arc::new(Settings::default()),
            network.clone(),
            store.clone(),
            ClientBroadcaster::default(),
        );
        (engine, store, network)
    }

    async fn enqueue(store: &InMemoryOfflineStore, body: serde_json::Value) -> QueuedWrite {
        let mut headers = BTreeMap::new();
        headers.insert("authorization".to_string(), "Bearer t".to_string());
        store
            .enqueue_write(QueuedWriteDraft {
                url: "https://abc.supabase.co/rest/v1/messages".to_string(),
                method: "POST".to_string(),
                headers,
                body,
                created_at: 1,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_failed_replay_stays_queued_until_success() {
        let (engine, store, network) = engine(false);
        enqueue(&store, json!({"text": "hi"})).await;

        let report = engine.handle("sync-messages").await;
        assert_eq!((report.replayed, report.pending), (0, 1));
        assert_eq!(store.queued_writes().await.unwrap().len(), 1);

        network.online.store(true, Ordering::SeqCst);
        let report = engine.handle("sync-messages").await;
        assert_eq!((report.replayed, report.pending), (1, 0));
        assert!(store.queued_writes().await.unwrap().is_empty());
        assert_eq!(network.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_replay_marks_message_synced() {
        let (engine, store, _) = engine(true);
        let body = json!({"id": "m1", "conversation_id": "c1", "created_at": "2024-01-01", "text": "hi"});
        store
            .put_messages(&[ChatMessage::from_payload(body.clone(), SyncStatus::Pending).unwrap()])
            .await
            .unwrap();
        enqueue(&store, body).await;

        engine.handle("sync-messages").await;

        let messages = store.messages_for_conversation("c1").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_duplicate_trigger_is_harmless() {
        let (engine, store, network) = engine(true);
        enqueue(&store, json!({"text": "once"})).await;

        let (first, second) = tokio::join!(engine.handle("sync-messages"), engine.handle("sync-messages"));

        // At-least-once: overlapping triggers may both send the record.
        assert!(first.replayed + second.replayed >= 1);
        assert!(network.calls.load(Ordering::SeqCst) <= 2);
        assert!(store.queued_writes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listings_tag_trims_store() {
        let (engine, store, _) = engine(true);
        for n in 0..25 {
            let listing = RecentListing::from_payload(json!({"id": format!("l{}", n)}), n).unwrap();
            store.put_recent_listing(&listing).await.unwrap();
        }

        let report = engine.handle("sync-listings").await;
        assert_eq!(report.trimmed, 5);
        assert_eq!(store.recent_listings().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_sync_complete_published() {
        let (engine, _, _) = engine(true);
        let mut events = engine.broadcaster.subscribe();

        engine.handle("sync-messages").await;
        match events.recv().await.unwrap() {
            CoreEvent::SyncComplete { tag, .. } => assert_eq!(tag, "sync-messages"),
            other => panic!("unexpected event: {:?}", other),
        }

        engine.handle("mystery").await;
        assert!(events.try_recv().is_err());
    }
}
