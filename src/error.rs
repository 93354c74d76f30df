//! Error types for the cache and sync engine.

use thiserror::Error;

/// A network fetch that did not produce a response at all.
///
/// HTTP error statuses are responses, not `NetworkError`s.
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("network request failed: {0}")]
    Transport(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("storage task failed: {0}")]
    Task(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("client window not found: {0}")]
    ClientNotFound(String),
}

/// Umbrella error returned by worker event handlers.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("invalid route pattern: {0}")]
    Config(#[from] regex::Error),

    #[error("invalid origin '{0}'")]
    InvalidOrigin(String),

    #[error("worker channel closed")]
    ChannelClosed,
}
