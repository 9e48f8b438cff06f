use std::time::Duration;

use docstore_backend::{MAX_ENTITIES_PER_WRITE_REQUEST, MAX_KEYS_PER_READ_REQUEST};
use serde::{Deserialize, Serialize};

/// Configuration of the [`DatastoreWrapper`](crate::DatastoreWrapper).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Largest number of mutations sent in one write request.
    pub max_entities_per_write: usize,
    /// Largest number of keys sent in one lookup request.
    pub max_keys_per_read: usize,
    /// When set, a query waits until this long has passed since the last
    /// write made through the wrapper.
    ///
    /// This masks the backend's eventual consistency in tests and CI runs so
    /// that a query issued right after a write sees it. It is not a
    /// correctness mechanism and must stay off in production.
    pub wait_for_consistency: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_entities_per_write: MAX_ENTITIES_PER_WRITE_REQUEST,
            max_keys_per_read: MAX_KEYS_PER_READ_REQUEST,
            wait_for_consistency: None,
        }
    }
}

impl ClientConfig {
    /// Default limits plus a consistency wait, for test environments.
    pub fn for_tests(wait: Duration) -> Self {
        Self {
            wait_for_consistency: Some(wait),
            ..Default::default()
        }
    }
}
