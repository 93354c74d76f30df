//! Outbound Queue & Sync Engine
//!
//! Information Hiding:
//! - Callers see a send that always answers: delivered, queued (202) or
//!   refused (503)
//! - Replay order, acknowledgment and dequeueing stay inside `SyncEngine`

pub mod engine;
pub mod outbox;

pub use engine::{SyncEngine, SyncReport};
pub use outbox::Outbox;
