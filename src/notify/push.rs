use super::{Notification, NotificationAction, NotificationData, NotificationKind};
use crate::config::NotificationConfig;
use chrono::DateTime;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Push message as sent by the backend. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub kind: Option<String>,
    pub url: Option<String>,
    pub timestamp: Option<i64>,
    pub actions: Option<Vec<NotificationAction>>,
    pub data: Option<Value>,
}

impl PushPayload {
    /// Decode a push payload. Anything that is not a JSON object becomes a
    /// plain-text body. Fields of the wrong type are ignored.
    pub fn parse(raw: &[u8]) -> Self {
        if raw.is_empty() {
            return Self::default();
        }
        match serde_json::from_slice::<Value>(raw) {
            Ok(Value::Object(fields)) => Self::from_fields(&fields),
            Ok(_) => {
                tracing::warn!("[Push] Payload is not a JSON object, using it as text");
                Self::text(raw)
            }
            Err(e) => {
                tracing::warn!("[Push] Payload is not JSON ({}), using it as text", e);
                Self::text(raw)
            }
        }
    }

    fn text(raw: &[u8]) -> Self {
        Self {
            body: Some(String::from_utf8_lossy(raw).into_owned()),
            ..Self::default()
        }
    }

    fn from_fields(fields: &Map<String, Value>) -> Self {
        let string = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);

        let actions = fields.get("actions").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<NotificationAction>(item.clone()).ok())
                .collect::<Vec<_>>()
        });

        Self {
            title: string("title"),
            body: string("body"),
            kind: string("type"),
            url: string("url"),
            timestamp: fields.get("timestamp").and_then(parse_timestamp),
            actions,
            data: fields.get("data").cloned(),
        }
    }
}

/// Epoch milliseconds, or an RFC 3339 string.
fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|t| t.timestamp_millis()),
        _ => None,
    }
}

fn action(action: &str, title: &str) -> NotificationAction {
    NotificationAction {
        action: action.to_string(),
        title: title.to_string(),
        icon: None,
    }
}

static DEFAULT_ACTIONS: Lazy<HashMap<NotificationKind, Vec<NotificationAction>>> = Lazy::new(|| {
    HashMap::from([
        (
            NotificationKind::Message,
            vec![action("reply", "Reply"), action("view", "View")],
        ),
        (
            NotificationKind::Offer,
            vec![action("view", "View Offer"), action("dismiss", "Dismiss")],
        ),
        (
            NotificationKind::Order,
            vec![action("track", "Track Order"), action("view", "View Details")],
        ),
        (
            NotificationKind::PriceDrop,
            vec![action("view", "View Listing"), action("dismiss", "Dismiss")],
        ),
    ])
});

pub fn build_notification(payload: PushPayload, config: &NotificationConfig, now_ms: i64) -> Notification {
    let kind = payload
        .kind
        .as_deref()
        .map(NotificationKind::parse)
        .unwrap_or(NotificationKind::General);
    let timestamp = payload.timestamp.unwrap_or(now_ms);

    let actions = match payload.actions {
        Some(actions) if !actions.is_empty() => actions,
        _ => DEFAULT_ACTIONS.get(&kind).cloned().unwrap_or_default(),
    };

    Notification {
        title: payload.title.unwrap_or_else(|| config.default_title.clone()),
        body: payload.body.unwrap_or_else(|| config.default_body.clone()),
        icon: config.icon.clone(),
        badge: config.badge.clone(),
        vibrate: config.vibrate.clone(),
        // Unique per instance so separate notifications of one type do not collapse.
        tag: format!("{}-{}", kind.as_str(), timestamp),
        renotify: true,
        require_interaction: kind.requires_interaction(),
        actions,
        data: NotificationData {
            url: payload.url,
            kind,
            timestamp,
            extra: payload.data,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(raw: &str) -> Notification {
        build_notification(PushPayload::parse(raw.as_bytes()), &NotificationConfig::default(), 42)
    }

    #[test]
    fn test_message_notification() {
        let n = build(r#"{"title":"Ana","body":"Is it available?","type":"message","url":"/messages/c1","timestamp":1000}"#);

        assert_eq!(n.title, "Ana");
        assert_eq!(n.tag, "message-1000");
        assert!(n.require_interaction);
        assert!(n.renotify);
        assert_eq!(n.data.url.as_deref(), Some("/messages/c1"));
        let actions: Vec<_> = n.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, vec!["reply", "view"]);
    }

    #[test]
    fn test_type_specific_defaults() {
        assert!(build(r#"{"type":"offer"}"#).require_interaction);
        assert!(!build(r#"{"type":"order"}"#).require_interaction);
        assert_eq!(build(r#"{"type":"order"}"#).actions[0].action, "track");
        assert_eq!(build(r#"{"type":"price-drop"}"#).data.kind, NotificationKind::PriceDrop);
        assert!(build(r#"{"type":"weekly_digest"}"#).actions.is_empty());
    }

    #[test]
    fn test_custom_actions_win() {
        let n = build(r#"{"type":"message","actions":[{"action":"archive","title":"Archive"}]}"#);
        assert_eq!(n.actions.len(), 1);
        assert_eq!(n.actions[0].action, "archive");
    }

    #[test]
    fn test_malformed_payload_becomes_text_body() {
        let n = build("Your item sold!");
        assert_eq!(n.title, NotificationConfig::default().default_title);
        assert_eq!(n.body, "Your item sold!");
        assert_eq!(n.data.kind, NotificationKind::General);
        assert_eq!(n.tag, "general-42");
    }

    #[test]
    fn test_mistyped_fields_are_ignored() {
        let n = build(
            r#"{"title":"Ana","body":"Hi","type":"message","url":"/messages/c1","timestamp":true,"actions":"reply"}"#,
        );
        assert_eq!(n.title, "Ana");
        assert_eq!(n.body, "Hi");
        assert_eq!(n.data.kind, NotificationKind::Message);
        assert_eq!(n.data.url.as_deref(), Some("/messages/c1"));
        assert_eq!(n.tag, "message-42");
        assert_eq!(n.actions[0].action, "reply");
    }

    #[test]
    fn test_rfc3339_timestamp() {
        let n = build(r#"{"title":"Ana","type":"message","timestamp":"2024-05-01T10:00:00Z"}"#);
        assert_eq!(n.title, "Ana");
        assert_eq!(n.data.timestamp, 1_714_557_600_000);
        assert_eq!(n.tag, "message-1714557600000");
    }

    #[test]
    fn test_invalid_actions_are_dropped() {
        let n = build(r#"{"title":"Ana","type":"order","actions":[{"action":"reply"},{"action":"archive","title":"Archive"}]}"#);
        assert_eq!(n.title, "Ana");
        assert_eq!(n.actions.len(), 1);
        assert_eq!(n.actions[0].action, "archive");

        let n = build(r#"{"type":"order","actions":[{"action":"reply"}]}"#);
        assert_eq!(n.actions[0].action, "track");
    }

    #[test]
    fn test_json_scalar_becomes_text_body() {
        let n = build("\"Your item sold!\"");
        assert_eq!(n.body, "\"Your item sold!\"");
        assert_eq!(n.data.kind, NotificationKind::General);
    }

    #[test]
    fn test_empty_payload_uses_defaults() {
        let n = build("");
        assert_eq!(n.body, NotificationConfig::default().default_body);
    }
}
