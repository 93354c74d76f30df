//! SQLite Offline Store
//!
//! Information Hiding:
//! - Schema, indexes and SQL hidden behind the `OfflineStore` trait
//! - Blocking rusqlite calls run on the blocking pool; every multi-row
//!   write is a single transaction
//!
//! The schema version is tracked with `PRAGMA user_version`.

use super::models::{ChatMessage, QueuedWrite, QueuedWriteDraft, RecentListing, SyncStatus};
use super::OfflineStore;
use crate::error::StoreError;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const DB_VERSION: i32 = 1;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        sync_status TEXT NOT NULL,
        payload TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);
    CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages(created_at);
    CREATE INDEX IF NOT EXISTS idx_messages_sync_status ON messages(sync_status);

    CREATE TABLE IF NOT EXISTS message_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL,
        method TEXT NOT NULL,
        headers TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        sync_status TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS recent_listings (
        id TEXT PRIMARY KEY,
        viewed_at INTEGER NOT NULL,
        payload TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_recent_listings_viewed_at ON recent_listings(viewed_at);

    CREATE TABLE IF NOT EXISTS session (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

pub struct SqliteOfflineStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteOfflineStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let mut conn = Connection::open(&path)?;
            migrate(&mut conn)?;
            tracing::info!("[SqliteStore] Opened offline store at {:?}", path);
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn call<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Task("connection mutex poisoned".to_string()))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn migrate(conn: &mut Connection) -> Result<(), StoreError> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version < DB_VERSION {
        let tx = conn.transaction()?;
        tx.execute_batch(SCHEMA)?;
        tx.pragma_update(None, "user_version", DB_VERSION)?;
        tx.commit()?;
        tracing::info!("[SqliteStore] Migrated schema from version {} to {}", version, DB_VERSION);
    }
    Ok(())
}

fn parse_object(json: &str) -> Result<Map<String, Value>, StoreError> {
    match serde_json::from_str(json)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidRecord("stored payload is not an object".to_string())),
    }
}

type MessageRow = (String, String, i64, String, String);

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn message_from_row((id, conversation_id, created_at, status, payload): MessageRow) -> Result<ChatMessage, StoreError> {
    Ok(ChatMessage {
        id,
        conversation_id,
        created_at,
        sync_status: SyncStatus::parse(&status)?,
        payload: parse_object(&payload)?,
    })
}

fn query_messages(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<ChatMessage>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, message_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(message_from_row).collect()
}

const MESSAGE_COLUMNS: &str = "SELECT id, conversation_id, created_at, sync_status, payload FROM messages";

#[async_trait]
impl OfflineStore for SqliteOfflineStore {
    async fn put_messages(&self, messages: &[ChatMessage]) -> Result<(), StoreError> {
        let rows = messages
            .iter()
            .map(|m| {
                Ok((
                    m.id.clone(),
                    m.conversation_id.clone(),
                    m.created_at,
                    m.sync_status.as_str(),
                    serde_json::to_string(&m.payload)?,
                ))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        self.call(move |conn| {
            let tx = conn.transaction()?;
            for (id, conversation_id, created_at, status, payload) in &rows {
                tx.execute(
                    "INSERT OR REPLACE INTO messages (id, conversation_id, created_at, sync_status, payload)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![id, conversation_id, created_at, status, payload],
                )?;
            }
            tx.commit()?;
            tracing::debug!("[SqliteStore] Stored {} messages", rows.len());
            Ok(())
        })
        .await
    }

    async fn messages_for_conversation(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let conversation_id = conversation_id.to_string();
        self.call(move |conn| {
            query_messages(
                conn,
                &format!("{} WHERE conversation_id = ?1 ORDER BY created_at ASC", MESSAGE_COLUMNS),
                params![conversation_id],
            )
        })
        .await
    }

    async fn all_messages(&self) -> Result<Vec<ChatMessage>, StoreError> {
        self.call(|conn| {
            query_messages(conn, &format!("{} ORDER BY created_at ASC", MESSAGE_COLUMNS), [])
        })
        .await
    }

    async fn messages_with_status(&self, status: SyncStatus) -> Result<Vec<ChatMessage>, StoreError> {
        self.call(move |conn| {
            query_messages(
                conn,
                &format!("{} WHERE sync_status = ?1 ORDER BY created_at ASC", MESSAGE_COLUMNS),
                params![status.as_str()],
            )
        })
        .await
    }

    async fn enqueue_write(&self, draft: QueuedWriteDraft) -> Result<QueuedWrite, StoreError> {
        let headers = serde_json::to_string(&draft.headers)?;
        let body = serde_json::to_string(&draft.body)?;
        let id = {
            let (url, method, created_at) = (draft.url.clone(), draft.method.clone(), draft.created_at);
            self.call(move |conn| {
                conn.execute(
                    "INSERT INTO message_queue (url, method, headers, body, created_at, sync_status)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![url, method, headers, body, created_at, SyncStatus::Pending.as_str()],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?
        };
        tracing::debug!("[SqliteStore] Queued write {} for {}", id, draft.url);
        Ok(draft.into_record(id))
    }

    async fn queued_writes(&self) -> Result<Vec<QueuedWrite>, StoreError> {
        self.call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, url, method, headers, body, created_at, sync_status
                 FROM message_queue ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, url, method, headers, body, created_at, status)| {
                    Ok(QueuedWrite {
                        id,
                        url,
                        method,
                        headers: serde_json::from_str(&headers)?,
                        body: serde_json::from_str(&body)?,
                        created_at,
                        sync_status: SyncStatus::parse(&status)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn delete_queued_write(&self, id: i64) -> Result<bool, StoreError> {
        self.call(move |conn| {
            let deleted = conn.execute("DELETE FROM message_queue WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn clear_queue(&self) -> Result<usize, StoreError> {
        self.call(|conn| Ok(conn.execute("DELETE FROM message_queue", [])?))
            .await
    }

    async fn put_recent_listing(&self, listing: &RecentListing) -> Result<(), StoreError> {
        let id = listing.id.clone();
        let viewed_at = listing.viewed_at;
        let payload = serde_json::to_string(&listing.payload)?;
        self.call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO recent_listings (id, viewed_at, payload) VALUES (?1, ?2, ?3)",
                params![id, viewed_at, payload],
            )?;
            Ok(())
        })
        .await
    }

    async fn recent_listings(&self) -> Result<Vec<RecentListing>, StoreError> {
        self.call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, viewed_at, payload FROM recent_listings ORDER BY viewed_at DESC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, viewed_at, payload)| {
                    Ok(RecentListing {
                        id,
                        viewed_at,
                        payload: parse_object(&payload)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn trim_recent_listings(&self, max: usize) -> Result<usize, StoreError> {
        let max = max as i64;
        self.call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM recent_listings WHERE id NOT IN (
                     SELECT id FROM recent_listings ORDER BY viewed_at DESC LIMIT ?1
                 )",
                params![max],
            )?;
            if removed > 0 {
                tracing::debug!("[SqliteStore] Trimmed {} recent listings", removed);
            }
            Ok(removed)
        })
        .await
    }

    async fn session_get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let key = key.to_string();
        self.call(move |conn| {
            let raw: Option<String> = conn
                .query_row("SELECT value FROM session WHERE key = ?1", params![key], |row| row.get(0))
                .optional()?;
            raw.map(|json| serde_json::from_str(&json).map_err(StoreError::from))
                .transpose()
        })
        .await
    }

    async fn session_set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let key = key.to_string();
        let value = serde_json::to_string(value)?;
        self.call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO session (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
            Ok(())
        })
        .await
    }

    async fn session_delete(&self, key: &str) -> Result<bool, StoreError> {
        let key = key.to_string();
        self.call(move |conn| {
            let deleted = conn.execute("DELETE FROM session WHERE key = ?1", params![key])?;
            Ok(deleted > 0)
        })
        .await
    }
}
