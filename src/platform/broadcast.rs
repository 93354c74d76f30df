use crate::worker::messages::CoreEvent;
use tokio::sync::broadcast::{self, Receiver, Sender};

/// Pub/sub channel for events posted to every open host view.
///
/// Publishing never blocks and never fails: with no subscribers the event
/// is dropped, matching a post to zero open windows.
#[derive(Clone)]
pub struct ClientBroadcaster {
    sender: Sender<CoreEvent>,
}

impl ClientBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: CoreEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!("[Broadcaster] No open clients, event dropped");
                0
            }
        }
    }
}

impl Default for ClientBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}
