//! Base URL rotation for failover.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{SyncError, SyncResult};

/// Ordered set of base URLs with a round-robin cursor.
///
/// The cursor only moves when the caller reports a transport failure, so a
/// healthy endpoint keeps serving every call.
#[derive(Debug)]
pub struct Endpoints {
    urls: Vec<String>,
    cursor: AtomicUsize,
}

impl Endpoints {
    pub fn new(urls: Vec<String>) -> SyncResult<Self> {
        if urls.is_empty() {
            return Err(SyncError::InvalidEndpoint(
                "no base URL configured".to_string(),
            ));
        }
        Ok(Self {
            urls,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Base URL the next call should use.
    pub fn current(&self) -> &str {
        let index = self.cursor.load(Ordering::Relaxed) % self.urls.len();
        &self.urls[index]
    }

    /// Move to the next base URL after `failed` stopped answering.
    ///
    /// Does nothing if another caller already rotated away from `failed`.
    pub fn rotate_from(&self, failed: &str) {
        let len = self.urls.len();
        let current = self.cursor.load(Ordering::Relaxed);
        if self.urls[current % len] != failed {
            return;
        }
        let next = (current + 1) % len;
        if self
            .cursor
            .compare_exchange(current, next, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
            && len > 1
        {
            tracing::warn!(failed = %failed, next = %self.urls[next], "Switching config endpoint");
        }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
