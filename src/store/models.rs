//! Records held by the durable local store.
//!
//! Chat messages and listings keep the host's payload verbatim; the
//! indexed fields are extracted from it when the record is created.

use crate::error::StoreError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
        }
    }

    pub fn parse(value: &str) -> Result<Self, StoreError> {
        match value {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            other => Err(StoreError::InvalidRecord(format!("unknown sync status '{}'", other))),
        }
    }
}

/// Ids arrive as strings or numbers depending on the backend table.
fn key_field(payload: &Map<String, Value>, field: &str) -> Result<String, StoreError> {
    match payload.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(StoreError::InvalidRecord(format!("missing '{}'", field))),
    }
}

fn into_object(value: Value, kind: &str) -> Result<Map<String, Value>, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidRecord(format!("{} must be a JSON object", kind))),
    }
}

/// Milliseconds since the Unix epoch. Accepts epoch numbers, numeric
/// strings, RFC 3339, naive date-times and plain dates. Anything else is 0.
fn epoch_millis(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Some(Value::String(s)) => parse_time(s.trim()).unwrap_or(0),
        _ => 0,
    }
}

fn parse_time(s: &str) -> Option<i64> {
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.timestamp_millis());
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(t.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc().timestamp_millis())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    /// Sort key derived from the payload's `created_at`, in epoch milliseconds.
    pub created_at: i64,
    pub sync_status: SyncStatus,
    pub payload: Map<String, Value>,
}

impl ChatMessage {
    pub fn from_payload(value: Value, sync_status: SyncStatus) -> Result<Self, StoreError> {
        let payload = into_object(value, "message")?;
        Ok(Self {
            id: key_field(&payload, "id")?,
            conversation_id: key_field(&payload, "conversation_id")?,
            created_at: epoch_millis(payload.get("created_at")),
            sync_status,
            payload,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.payload.clone();
        map.insert(
            "sync_status".to_string(),
            Value::String(self.sync_status.as_str().to_string()),
        );
        Value::Object(map)
    }
}

impl Serialize for ChatMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecentListing {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub viewed_at: i64,
    pub payload: Map<String, Value>,
}

impl RecentListing {
    pub fn from_payload(value: Value, viewed_at: i64) -> Result<Self, StoreError> {
        let mut payload = into_object(value, "listing")?;
        payload.remove("viewed_at");
        Ok(Self {
            id: key_field(&payload, "id")?,
            viewed_at,
            payload,
        })
    }

    /// The host payload plus its `viewed_at` stamp.
    pub fn to_value(&self) -> Value {
        let mut map = self.payload.clone();
        map.insert("viewed_at".to_string(), Value::from(self.viewed_at));
        Value::Object(map)
    }
}

impl Serialize for RecentListing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// A write that could not reach the network and waits for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedWrite {
    pub id: i64,
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    pub created_at: i64,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone)]
pub struct QueuedWriteDraft {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    pub created_at: i64,
}

impl QueuedWriteDraft {
    pub fn into_record(self, id: i64) -> QueuedWrite {
        QueuedWrite {
            id,
            url: self.url,
            method: self.method,
            headers: self.headers,
            body: self.body,
            created_at: self.created_at,
            sync_status: SyncStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_message_from_payload() {
        let message = ChatMessage::from_payload(
            json!({"id": 7, "conversation_id": "c1", "created_at": "2024-05-01T10:00:00Z", "text": "hi"}),
            SyncStatus::Synced,
        )
        .unwrap();

        assert_eq!(message.id, "7");
        assert_eq!(message.conversation_id, "c1");
        assert_eq!(message.to_value()["text"], "hi");
        assert_eq!(message.to_value()["sync_status"], "synced");
    }

    #[test]
    fn test_created_at_normalized_to_epoch_millis() {
        let created = |v: Value| {
            ChatMessage::from_payload(json!({"id": "m", "conversation_id": "c", "created_at": v}), SyncStatus::Synced)
                .unwrap()
                .created_at
        };

        assert_eq!(created(json!(999)), 999);
        assert_eq!(created(json!("1000")), 1000);
        assert_eq!(created(json!("2024-05-01T10:00:00Z")), 1_714_557_600_000);
        assert_eq!(created(json!("2024-05-01T12:00:00+02:00")), 1_714_557_600_000);
        assert_eq!(created(json!("2024-05-01")), 1_714_521_600_000);
        assert_eq!(created(json!("yesterday")), 0);
        assert_eq!(created(json!(null)), 0);
    }

    #[test]
    fn test_chat_message_requires_conversation() {
        let result = ChatMessage::from_payload(json!({"id": "m1"}), SyncStatus::Synced);
        assert!(matches!(result, Err(StoreError::InvalidRecord(_))));
    }

    #[test]
    fn test_listing_round_trips_payload() {
        let payload = json!({"id": "l1", "title": "Bike", "price": 120, "images": ["a.png"]});
        let listing = RecentListing::from_payload(payload.clone(), 1_700_000_000_000).unwrap();

        let mut expected = payload.as_object().unwrap().clone();
        expected.insert("viewed_at".to_string(), json!(1_700_000_000_000i64));
        assert_eq!(listing.to_value(), Value::Object(expected));
    }

    #[test]
    fn test_listing_rejects_non_object() {
        assert!(RecentListing::from_payload(json!("l1"), 0).is_err());
    }
}
