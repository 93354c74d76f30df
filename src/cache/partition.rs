//! Insertion-ordered partition of cached responses.

use crate::core::http::Response;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Responses keyed by request identity, remembering insertion order.
///
/// Re-inserting an existing key moves it to the back, the same as a cache
/// `put` that replaces an entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderedPartition {
    order: VecDeque<String>,
    entries: HashMap<String, Response>,
}

impl OrderedPartition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, response: Response) {
        if self.entries.insert(key.clone(), response).is_some() {
            self.order.retain(|existing| existing != &key);
        }
        self.order.push_back(key);
    }

    pub fn get(&self, key: &str) -> Option<&Response> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.retain(|existing| existing != key);
            true
        } else {
            false
        }
    }

    /// Keys, oldest first.
    pub fn keys(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
