use super::{Notification, NotificationData, NotificationKind};
use crate::error::PlatformError;
use crate::platform::{ClientWindows, Notifier};
use reqwest::Url;

#[derive(Debug, Clone)]
pub struct NotificationClick {
    pub notification: Notification,
    /// The action button pressed, or `None` for a click on the body.
    pub action: Option<String>,
}

/// In-app path for a click. `None` means the click only dismisses.
pub fn resolve_target(data: &NotificationData, action: Option<&str>) -> Option<String> {
    if action == Some("dismiss") {
        return None;
    }
    if let Some(url) = data.url.as_deref().filter(|url| !url.is_empty()) {
        return Some(url.to_string());
    }

    // reply/view on a message and track/view on an order land on the same views.
    let path = match data.kind {
        NotificationKind::Message => "/messages".to_string(),
        NotificationKind::Offer => "/offers".to_string(),
        NotificationKind::Order => "/orders".to_string(),
        NotificationKind::PriceDrop => data
            .extra
            .as_ref()
            .and_then(|extra| extra.get("listing_id"))
            .map(|id| match id.as_str() {
                Some(s) => format!("/listings/{}", s),
                None => format!("/listings/{}", id),
            })
            .unwrap_or_else(|| "/".to_string()),
        NotificationKind::General => "/".to_string(),
    };
    Some(path)
}

/// Close the notification, then focus an existing app window at the
/// target or open a new one. Returns the URL navigated to.
pub async fn handle_click(
    click: &NotificationClick,
    origin: &Url,
    notifier: &dyn Notifier,
    windows: &dyn ClientWindows,
) -> Result<Option<String>, PlatformError> {
    notifier.close(&click.notification.tag).await?;

    let Some(target) = resolve_target(&click.notification.data, click.action.as_deref()) else {
        tracing::debug!("[NotificationClick] Dismissed '{}'", click.notification.tag);
        return Ok(None);
    };
    let url = match origin.join(&target) {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::warn!("[NotificationClick] Bad target '{}': {}", target, e);
            return Ok(None);
        }
    };

    let existing = windows
        .windows()
        .await
        .into_iter()
        .find(|window| same_origin(&window.url, origin));

    match existing {
        Some(window) => {
            windows.navigate(&window.id, &url).await?;
            windows.focus(&window.id).await?;
            tracing::info!("[NotificationClick] Focused {} at {}", window.id, url);
        }
        None => {
            windows.open_window(&url).await?;
            tracing::info!("[NotificationClick] Opened new window at {}", url);
        }
    }
    Ok(Some(url))
}

fn same_origin(window_url: &str, origin: &Url) -> bool {
    Url::parse(window_url)
        .map(|url| url.origin() == origin.origin())
        .unwrap_or(false)
}
