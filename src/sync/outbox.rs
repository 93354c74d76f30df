use crate::core::http::{Network, Request, Response};
use crate::fetch::OFFLINE_HEADER;
use crate::platform::ClientBroadcaster;
use crate::store::{ChatMessage, OfflineStore, QueuedWriteDraft, SyncStatus};
use crate::worker::messages::CoreEvent;
use serde_json::{json, Value};
use std::sync::Arc;

fn queue_failure(reason: &str) -> Response {
    Response::json(
        503,
        &json!({
            "error": "queue_failed",
            "message": reason,
            "offline": true,
        }),
    )
}

/// Intercepts message-send POSTs and queues them when the network is down.
pub struct Outbox {
    network: Arc<dyn Network>,
    store: Arc<dyn OfflineStore>,
    broadcaster: ClientBroadcaster,
}

impl Outbox {
    pub fn new(network: Arc<dyn Network>, store: Arc<dyn OfflineStore>, broadcaster: ClientBroadcaster) -> Self {
        Self {
            network,
            store,
            broadcaster,
        }
    }

    /// Pass the request through; on network failure persist it for replay
    /// and acknowledge with 202. Never returns an error.
    pub async fn send(&self, request: &Request) -> Response {
        let error = match self.network.fetch(request).await {
            Ok(response) => return response,
            Err(e) => e,
        };
        tracing::warn!("[Outbox] Send to '{}' failed ({}), queueing", request.url, error);

        let body: Value = match request.body.as_deref().map(serde_json::from_slice) {
            Some(Ok(body)) => body,
            Some(Err(e)) => {
                tracing::error!("[Outbox] Request body is not JSON: {}", e);
                return queue_failure("Message body could not be read; it was not queued.");
            }
            None => {
                tracing::error!("[Outbox] Request has no body, nothing to queue");
                return queue_failure("Message body is empty; it was not queued.");
            }
        };

        let draft = QueuedWriteDraft {
            url: request.url.to_string(),
            method: request.method.clone(),
            headers: request.headers.clone(),
            body: body.clone(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };

        let record = match self.store.enqueue_write(draft).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("[Outbox] Failed to persist queued write: {}", e);
                return queue_failure("Message could not be saved for later delivery.");
            }
        };

        // Keep the pending message visible in its conversation while offline.
        if let Ok(message) = ChatMessage::from_payload(body, SyncStatus::Pending) {
            if let Err(e) = self.store.put_messages(&[message]).await {
                tracing::warn!("[Outbox] Failed to store pending message: {}", e);
            }
        }

        tracing::info!("[Outbox] Queued write {} for '{}'", record.id, record.url);
        let id = record.id;
        self.broadcaster.publish(CoreEvent::MessageQueued(record));

        Response::json(
            202,
            &json!({
                "queued": true,
                "id": id,
                "message": "Message queued and will be sent when you're back online.",
            }),
        )
        .with_header(OFFLINE_HEADER, "true")
    }
}
