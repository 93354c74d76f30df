//! Host application <-> core message shapes.
//!
//! Both directions use `{"type": "...", "payload": ...}` envelopes.

use crate::store::{ChatMessage, QueuedWrite};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Requests posted by the host application.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMessage {
    SkipWaiting,
    CacheListing(Value),
    CacheMessages(Vec<Value>),
    GetCachedMessages { conversation_id: String },
    GetQueuedMessages,
    ClearQueue,
    CacheVersionCheck,
    SessionSet { key: String, value: Value },
    SessionGet { key: String },
}

impl HostMessage {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Events published by the core, either broadcast to every open view or
/// returned as the reply to a `HostMessage`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoreEvent {
    MessageQueued(QueuedWrite),
    SyncComplete {
        tag: String,
        replayed: usize,
        pending: usize,
    },
    CachedMessages {
        conversation_id: String,
        messages: Vec<ChatMessage>,
    },
    QueuedMessages(Vec<QueuedWrite>),
    CacheVersion {
        version: String,
    },
    SessionValue {
        key: String,
        value: Option<Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_unit_and_payload_messages() {
        assert_eq!(HostMessage::parse(r#"{"type":"SKIP_WAITING"}"#).unwrap(), HostMessage::SkipWaiting);
        assert_eq!(
            HostMessage::parse(r#"{"type":"GET_CACHED_MESSAGES","payload":{"conversation_id":"c1"}}"#).unwrap(),
            HostMessage::GetCachedMessages {
                conversation_id: "c1".to_string()
            }
        );
        assert_eq!(
            HostMessage::parse(r#"{"type":"CACHE_LISTING","payload":{"id":"l1"}}"#).unwrap(),
            HostMessage::CacheListing(json!({"id": "l1"}))
        );
    }

    #[test]
    fn test_unknown_message_rejected() {
        assert!(HostMessage::parse(r#"{"type":"REBOOT"}"#).is_err());
    }

    #[test]
    fn test_core_event_envelope() {
        let event = CoreEvent::SyncComplete {
            tag: "sync-messages".to_string(),
            replayed: 2,
            pending: 1,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "SYNC_COMPLETE", "payload": {"tag": "sync-messages", "replayed": 2, "pending": 1}})
        );
    }
}
