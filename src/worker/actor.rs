use super::dispatcher::{EventHandler, FetchOutcome};
use super::lifecycle::InstallReport;
use super::messages::{CoreEvent, HostMessage};
use crate::core::http::Request;
use crate::error::WorkerError;
use crate::notify::{Notification, NotificationClick};
use crate::sync::SyncReport;
use std::sync::Arc;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::oneshot;

type Reply<T> = oneshot::Sender<Result<T, WorkerError>>;

/// One worker event plus the channel its result goes back on.
pub enum WorkerEvent {
    Install(Reply<InstallReport>),
    Activate(Reply<Vec<String>>),
    Fetch(Request, Reply<FetchOutcome>),
    Message(HostMessage, Reply<Option<CoreEvent>>),
    Push(Vec<u8>, Reply<Notification>),
    NotificationClick(NotificationClick, Reply<Option<String>>),
    Sync(String, Reply<SyncReport>),
    PeriodicSync(String, Reply<SyncReport>),
    Shutdown,
}

/// Handle to a worker task that handles one event at a time.
#[derive(Clone)]
pub struct WorkerHandle {
    sender: Sender<WorkerEvent>,
}

impl WorkerHandle {
    pub fn new(handler: Arc<dyn EventHandler>, buffer_size: usize) -> Self {
        let (sender, receiver) = channel(buffer_size);
        tokio::spawn(worker_actor(receiver, handler));
        Self { sender }
    }

    pub async fn send_event(&self, event: WorkerEvent) -> Result<(), WorkerError> {
        self.sender.send(event).await.map_err(|_| WorkerError::ChannelClosed)
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> WorkerEvent) -> Result<T, WorkerError> {
        let (tx, rx) = oneshot::channel();
        self.send_event(build(tx)).await?;
        rx.await.map_err(|_| WorkerError::ChannelClosed)?
    }

    pub async fn install(&self) -> Result<InstallReport, WorkerError> {
        self.request(WorkerEvent::Install).await
    }

    pub async fn activate(&self) -> Result<Vec<String>, WorkerError> {
        self.request(WorkerEvent::Activate).await
    }

    pub async fn fetch(&self, request: Request) -> Result<FetchOutcome, WorkerError> {
        self.request(|tx| WorkerEvent::Fetch(request, tx)).await
    }

    pub async fn message(&self, message: HostMessage) -> Result<Option<CoreEvent>, WorkerError> {
        self.request(|tx| WorkerEvent::Message(message, tx)).await
    }

    pub async fn push(&self, payload: Vec<u8>) -> Result<Notification, WorkerError> {
        self.request(|tx| WorkerEvent::Push(payload, tx)).await
    }

    pub async fn notification_click(&self, click: NotificationClick) -> Result<Option<String>, WorkerError> {
        self.request(|tx| WorkerEvent::NotificationClick(click, tx)).await
    }

    pub async fn sync(&self, tag: impl Into<String>) -> Result<SyncReport, WorkerError> {
        let tag = tag.into();
        self.request(|tx| WorkerEvent::Sync(tag, tx)).await
    }

    pub async fn periodic_sync(&self, tag: impl Into<String>) -> Result<SyncReport, WorkerError> {
        let tag = tag.into();
        self.request(|tx| WorkerEvent::PeriodicSync(tag, tx)).await
    }

    pub async fn shutdown(&self) -> Result<(), WorkerError> {
        self.send_event(WorkerEvent::Shutdown).await
    }
}

async fn worker_actor(mut receiver: Receiver<WorkerEvent>, handler: Arc<dyn EventHandler>) {
    tracing::info!("Worker actor started");

    while let Some(event) = receiver.recv().await {
        // A dropped receiver means the caller stopped waiting; the event
        // still ran to completion.
        match event {
            WorkerEvent::Install(reply) => {
                let _ = reply.send(handler.install().await);
            }
            WorkerEvent::Activate(reply) => {
                let _ = reply.send(handler.activate().await);
            }
            WorkerEvent::Fetch(request, reply) => {
                let _ = reply.send(handler.fetch(request).await);
            }
            WorkerEvent::Message(message, reply) => {
                let _ = reply.send(handler.message(message).await);
            }
            WorkerEvent::Push(payload, reply) => {
                let _ = reply.send(handler.push(payload).await);
            }
            WorkerEvent::NotificationClick(click, reply) => {
                let _ = reply.send(handler.notification_click(click).await);
            }
            WorkerEvent::Sync(tag, reply) => {
                let _ = reply.send(handler.sync(tag).await);
            }
            WorkerEvent::PeriodicSync(tag, reply) => {
                let _ = reply.send(handler.periodic_sync(tag).await);
            }
            WorkerEvent::Shutdown => {
                tracing::info!("Worker actor received shutdown signal");
                break;
            }
        }
    }

    tracing::info!("Worker actor stopped");
}
