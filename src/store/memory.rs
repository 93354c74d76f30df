//! In-Memory Offline Store
//!
//! Information Hiding:
//! - Collections held in maps behind a single RwLock, so every call is atomic
//! - Suitable for testing; data is lost when the process terminates

use super::models::{ChatMessage, QueuedWrite, QueuedWriteDraft, RecentListing, SyncStatus};
use super::OfflineStore;
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Collections {
    messages: HashMap<String, ChatMessage>,
    queue: BTreeMap<i64, QueuedWrite>,
    next_queue_id: i64,
    listings: HashMap<String, RecentListing>,
    session: HashMap<String, Value>,
}

pub struct InMemoryOfflineStore {
    inner: Arc<RwLock<Collections>>,
}

impl InMemoryOfflineStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Collections::default())),
        }
    }
}

impl Default for InMemoryOfflineStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_by_created(mut messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    messages
}

#[async_trait]
impl OfflineStore for InMemoryOfflineStore {
    async fn put_messages(&self, messages: &[ChatMessage]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for message in messages {
            inner.messages.insert(message.id.clone(), message.clone());
        }
        Ok(())
    }

    async fn messages_for_conversation(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let inner = self.inner.read().await;
        Ok(sorted_by_created(
            inner
                .messages
                .values()
                .filter(|m| m.conversation_id == conversation_id)
                .cloned()
                .collect(),
        ))
    }

    async fn all_messages(&self) -> Result<Vec<ChatMessage>, StoreError> {
        let inner = self.inner.read().await;
        Ok(sorted_by_created(inner.messages.values().cloned().collect()))
    }

    async fn messages_with_status(&self, status: SyncStatus) -> Result<Vec<ChatMessage>, StoreError> {
        let inner = self.inner.read().await;
        Ok(sorted_by_created(
            inner
                .messages
                .values()
                .filter(|m| m.sync_status == status)
                .cloned()
                .collect(),
        ))
    }

    async fn enqueue_write(&self, draft: QueuedWriteDraft) -> Result<QueuedWrite, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_queue_id += 1;
        let record = draft.into_record(inner.next_queue_id);
        inner.queue.insert(record.id, record.clone());
        Ok(record)
    }

    async fn queued_writes(&self) -> Result<Vec<QueuedWrite>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.queue.values().cloned().collect())
    }

    async fn delete_queued_write(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner.queue.remove(&id).is_some())
    }

    async fn clear_queue(&self) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().await;
        let count = inner.queue.len();
        inner.queue.clear();
        Ok(count)
    }

    async fn put_recent_listing(&self, listing: &RecentListing) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.listings.insert(listing.id.clone(), listing.clone());
        Ok(())
    }

    async fn recent_listings(&self) -> Result<Vec<RecentListing>, StoreError> {
        let inner = self.inner.read().await;
        let mut listings: Vec<_> = inner.listings.values().cloned().collect();
        listings.sort_by(|a, b| b.viewed_at.cmp(&a.viewed_at));
        Ok(listings)
    }

    async fn trim_recent_listings(&self, max: usize) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.listings.len() <= max {
            return Ok(0);
        }
        let mut by_age: Vec<(i64, String)> = inner
            .listings
            .values()
            .map(|l| (l.viewed_at, l.id.clone()))
            .collect();
        by_age.sort();
        let excess = by_age.len() - max;
        for (_, id) in by_age.into_iter().take(excess) {
            inner.listings.remove(&id);
        }
        Ok(excess)
    }

    async fn session_get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.session.get(key).cloned())
    }

    async fn session_set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.session.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn session_delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner.session.remove(key).is_some())
    }
}
