pub mod fallback;
pub mod strategy;

pub use fallback::{OfflineFallback, OFFLINE_HEADER};
pub use strategy::{route, FetchStrategies, Strategy};
