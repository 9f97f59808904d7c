use std::sync::{Arc, Mutex};

use buildwatch::engine::StatusSink;
use buildwatch::types::StatusUpdate;
use tokio::sync::Notify;

/// A `StatusSink` that keeps every update, in order.
///
/// Clones share the same log, so a test can hand one clone to the loop and
/// inspect the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    updates: Arc<Mutex<Vec<StatusUpdate>>>,
    notify: Arc<Notify>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `n` updates were recorded.
    pub async fn wait_for(&self, n: usize) {
        loop {
            let notified = self.notify.notified();
            if self.len() >= n {
                return;
            }
            notified.await;
        }
    }
}

impl StatusSink for RecordingSink {
    fn publish(&self, update: &StatusUpdate) {
        self.updates.lock().unwrap().push(update.clone());
        self.notify.notify_waiters();
    }
}
