//! Cachewarden - offline cache and sync engine for marketplace clients
//!
//! Intercepts app requests and serves them from tiered HTTP caches, keeps
//! messages, recently viewed listings and unsent writes in a durable local
//! store, replays queued writes on sync and routes push notifications.

pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod fetch;
pub mod notify;
pub mod platform;
pub mod store;
pub mod sync;
pub mod utils;
pub mod worker;

pub use config::{CacheTier, Settings};
pub use error::WorkerError;
pub use worker::{CoreEvent, EventHandler, FetchOutcome, HostMessage, ServiceWorker, WorkerDeps, WorkerHandle};

use crate::cache::FileSystemCacheStorage;
use crate::core::HttpNetwork;
use crate::platform::{ClientBroadcaster, HeadlessPlatform};
use crate::store::SqliteOfflineStore;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;

static SYSTEM: OnceCell<System> = OnceCell::new();

pub struct System {
    settings: Settings,
    worker: WorkerHandle,
}

impl System {
    fn global() -> anyhow::Result<&'static System> {
        SYSTEM
            .get()
            .ok_or_else(|| anyhow::anyhow!("System not initialized. Call init() first"))
    }
}

/// Build a worker backed by the on-disk cache, the SQLite store and the
/// real network, with a headless platform for windows and notifications.
pub async fn build_service_worker(settings: Settings, platform: HeadlessPlatform) -> Result<ServiceWorker, WorkerError> {
    let cache = FileSystemCacheStorage::new(PathBuf::from(&settings.cache.directory)).await?;
    let store = SqliteOfflineStore::open(&settings.store.path).await?;
    let network = HttpNetwork::new(settings.network.timeout_secs)?;

    let deps = WorkerDeps {
        cache: Arc::new(cache),
        store: Arc::new(store),
        network: Arc::new(network),
        windows: Arc::new(platform.clone()),
        notifier: Arc::new(platform),
        broadcaster: ClientBroadcaster::new(settings.worker.broadcast_capacity),
    };
    ServiceWorker::new(settings, deps)
}

/// Initialize the system
/// Must be called before using any API functions
pub async fn init() -> anyhow::Result<()> {
    let settings = Settings::new()?;
    init_with(settings).await
}

pub async fn init_with(settings: Settings) -> anyhow::Result<()> {
    let worker = build_service_worker(settings.clone(), HeadlessPlatform::new()).await?;
    let handle = WorkerHandle::new(Arc::new(worker), settings.worker.channel_buffer_size);

    SYSTEM
        .set(System {
            settings,
            worker: handle,
        })
        .map_err(|_| anyhow::anyhow!("System already initialized"))?;

    tracing::info!("Cachewarden system initialized");
    Ok(())
}

pub fn worker() -> anyhow::Result<&'static WorkerHandle> {
    Ok(&System::global()?.worker)
}

pub fn settings() -> anyhow::Result<&'static Settings> {
    Ok(&System::global()?.settings)
}

/// Shutdown the system gracefully
pub async fn shutdown() -> anyhow::Result<()> {
    if let Some(system) = SYSTEM.get() {
        system.worker.shutdown().await?;
    }
    tracing::info!("Cachewarden system shutdown complete");
    Ok(())
}
