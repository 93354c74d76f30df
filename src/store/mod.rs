//! Durable Local Store
//!
//! Information Hiding:
//! - Storage backend hidden behind trait (SQLite for real use, memory for tests)
//! - Four independent collections: chat messages, outbound queue,
//!   recently-viewed listings and session key-value pairs
//! - The store keeps its own schema version, independent of the HTTP
//!   cache version, so a cache rollover never touches user data

use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::InMemoryOfflineStore;
pub use models::{ChatMessage, QueuedWrite, QueuedWriteDraft, RecentListing, SyncStatus};
pub use sqlite::SqliteOfflineStore;

#[async_trait]
pub trait OfflineStore: Send + Sync {
    /// Insert or replace messages in one transaction.
    async fn put_messages(&self, messages: &[ChatMessage]) -> Result<(), StoreError>;

    /// Messages of a conversation ordered by `created_at`.
    async fn messages_for_conversation(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, StoreError>;

    /// All messages ordered by `created_at`.
    async fn all_messages(&self) -> Result<Vec<ChatMessage>, StoreError>;

    async fn messages_with_status(&self, status: SyncStatus) -> Result<Vec<ChatMessage>, StoreError>;

    /// Persist a queued write and return it with its generated id.
    async fn enqueue_write(&self, draft: QueuedWriteDraft) -> Result<QueuedWrite, StoreError>;

    /// Queued writes, oldest first.
    async fn queued_writes(&self) -> Result<Vec<QueuedWrite>, StoreError>;

    /// Returns false if the record was already gone.
    async fn delete_queued_write(&self, id: i64) -> Result<bool, StoreError>;

    async fn clear_queue(&self) -> Result<usize, StoreError>;

    async fn put_recent_listing(&self, listing: &RecentListing) -> Result<(), StoreError>;

    /// Recently viewed listings, most recent first.
    async fn recent_listings(&self) -> Result<Vec<RecentListing>, StoreError>;

    /// Keep the `max` most recently viewed listings. Returns how many were removed.
    async fn trim_recent_listings(&self, max: usize) -> Result<usize, StoreError>;

    async fn session_get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn session_set(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    async fn session_delete(&self, key: &str) -> Result<bool, StoreError>;
}
