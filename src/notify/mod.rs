//! Push/Notification Router
//!
//! Turns server push payloads into platform notifications and routes
//! notification clicks to in-app views.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod click;
pub mod push;

pub use click::{handle_click, resolve_target, NotificationClick};
pub use push::{build_notification, PushPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Message,
    Offer,
    Order,
    PriceDrop,
    General,
}

impl NotificationKind {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().replace('-', "_").as_str() {
            "message" => NotificationKind::Message,
            "offer" => NotificationKind::Offer,
            "order" => NotificationKind::Order,
            "price_drop" => NotificationKind::PriceDrop,
            _ => NotificationKind::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Message => "message",
            NotificationKind::Offer => "offer",
            NotificationKind::Order => "order",
            NotificationKind::PriceDrop => "price_drop",
            NotificationKind::General => "general",
        }
    }

    pub fn requires_interaction(&self) -> bool {
        matches!(self, NotificationKind::Message | NotificationKind::Offer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Routing metadata carried with the notification and handed back on click.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    /// Explicit deep link from the payload, if any.
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub tag: String,
    pub renotify: bool,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
    pub data: NotificationData,
}
