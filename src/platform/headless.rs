//! Headless platform
//!
//! Records windows and notifications in memory. Used by the CLI, where
//! there is no browser, and by tests to assert on platform effects.

use super::{ClientWindows, Notifier, WindowClient};
use crate::error::PlatformError;
use crate::notify::Notification;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct PlatformState {
    windows: Vec<WindowClient>,
    next_window: usize,
    focused: Option<String>,
    claimed: bool,
    shown: Vec<Notification>,
    closed: Vec<String>,
}

#[derive(Clone, Default)]
pub struct HeadlessPlatform {
    state: Arc<RwLock<PlatformState>>,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_window(&self, url: &str) -> String {
        let mut state = self.state.write().await;
        state.next_window += 1;
        let id = format!("window-{}", state.next_window);
        state.windows.push(WindowClient {
            id: id.clone(),
            url: url.to_string(),
        });
        id
    }

    pub async fn focused(&self) -> Option<String> {
        self.state.read().await.focused.clone()
    }

    pub async fn is_claimed(&self) -> bool {
        self.state.read().await.claimed
    }

    pub async fn shown(&self) -> Vec<Notification> {
        self.state.read().await.shown.clone()
    }

    pub async fn closed(&self) -> Vec<String> {
        self.state.read().await.closed.clone()
    }
}

#[async_trait]
impl ClientWindows for HeadlessPlatform {
    async fn windows(&self) -> Vec<WindowClient> {
        self.state.read().await.windows.clone()
    }

    async fn navigate(&self, id: &str, url: &str) -> Result<(), PlatformError> {
        let mut state = self.state.write().await;
        let window = state
            .windows
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| PlatformError::ClientNotFound(id.to_string()))?;
        window.url = url.to_string();
        tracing::info!("[Platform] Navigated {} to {}", id, url);
        Ok(())
    }

    async fn focus(&self, id: &str) -> Result<(), PlatformError> {
        let mut state = self.state.write().await;
        if !state.windows.iter().any(|w| w.id == id) {
            return Err(PlatformError::ClientNotFound(id.to_string()));
        }
        state.focused = Some(id.to_string());
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<(), PlatformError> {
        let id = self.add_window(url).await;
        self.state.write().await.focused = Some(id);
        tracing::info!("[Platform] Opened window at {}", url);
        Ok(())
    }

    async fn claim(&self) -> Result<(), PlatformError> {
        self.state.write().await.claimed = true;
        Ok(())
    }
}

#[async_trait]
impl Notifier for HeadlessPlatform {
    async fn show(&self, notification: &Notification) -> Result<(), PlatformError> {
        tracing::info!(
            "[Platform] Notification '{}': {}",
            notification.title,
            notification.body
        );
        self.state.write().await.shown.push(notification.clone());
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<(), PlatformError> {
        self.state.write().await.closed.push(tag.to_string());
        Ok(())
    }
}
