pub mod classifier;
pub mod http;

pub use classifier::{RequestCategory, RequestClassifier};
pub use http::{HttpNetwork, Network, Request, RequestMode, Response};
