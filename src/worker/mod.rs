//! Worker runtime
//!
//! Information Hiding:
//! - Hosts see typed events in and typed replies out; which component
//!   serves an event is decided in `dispatcher`
//! - `WorkerHandle` serializes events through one task, so handlers never
//!   run concurrently on the same worker

pub mod actor;
pub mod dispatcher;
pub mod lifecycle;
pub mod messages;

pub use actor::{WorkerEvent, WorkerHandle};
pub use dispatcher::{EventHandler, FetchOutcome, ServiceWorker, WorkerDeps};
pub use lifecycle::{InstallReport, Lifecycle, WorkerState};
pub use messages::{CoreEvent, HostMessage};
