//! Platform boundary
//!
//! Information Hiding:
//! - Open application windows and the OS notification tray are reached only
//!   through these traits
//! - Fire-and-forget events to the host go through `ClientBroadcaster`,
//!   which knows nothing about windows

use crate::error::PlatformError;
use crate::notify::Notification;
use async_trait::async_trait;

pub mod broadcast;
pub mod headless;

pub use broadcast::ClientBroadcaster;
pub use headless::HeadlessPlatform;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait ClientWindows: Send + Sync {
    async fn windows(&self) -> Vec<WindowClient>;

    async fn navigate(&self, id: &str, url: &str) -> Result<(), PlatformError>;

    async fn focus(&self, id: &str) -> Result<(), PlatformError>;

    async fn open_window(&self, url: &str) -> Result<(), PlatformError>;

    /// Take control of every open window without waiting for a navigation.
    async fn claim(&self) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<(), PlatformError>;

    async fn close(&self, tag: &str) -> Result<(), PlatformError>;
}
