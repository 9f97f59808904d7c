// src/engine/status.rs

//! Delivery of status updates to the consumer.
//!
//! Two channels out of the loop:
//! - a [`StatusSink`] hook, called once per update, in order;
//! - the latest-status cell (`tokio::sync::watch`), which always holds one
//!   complete [`Status`] value.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::errors::FailureKind;
use crate::types::{Status, StatusUpdate};

/// Consumer hook for status updates.
///
/// Called synchronously from the watch loop task; implementations must
/// return quickly and never block.
pub trait StatusSink: Send + Sync {
    fn publish(&self, update: &StatusUpdate);
}

impl<F> StatusSink for F
where
    F: Fn(&StatusUpdate) + Send + Sync,
{
    fn publish(&self, update: &StatusUpdate) {
        self(update)
    }
}

impl StatusSink for mpsc::UnboundedSender<StatusUpdate> {
    fn publish(&self, update: &StatusUpdate) {
        // A consumer that went away just stops receiving.
        let _ = self.send(update.clone());
    }
}

/// Sink that discards updates; consumers then read the latest-status cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn publish(&self, _update: &StatusUpdate) {}
}

/// Writes updates to the cell and the sink.
#[derive(Clone)]
pub(crate) struct Publisher {
    cell: Arc<watch::Sender<Status>>,
    sink: Arc<dyn StatusSink>,
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("latest", &*self.cell.borrow())
            .finish_non_exhaustive()
    }
}

impl Publisher {
    pub(crate) fn new(cell: Arc<watch::Sender<Status>>, sink: Arc<dyn StatusSink>) -> Self {
        Self { cell, sink }
    }

    pub(crate) fn publish(&self, update: StatusUpdate) {
        match &update {
            StatusUpdate::Count(n) => info!(count = n, "process count updated"),
            StatusUpdate::Failure(failure) => info!(error = %failure, "process count unavailable"),
        }
        self.cell.send_replace(Status::Latest(update.clone()));
        self.sink.publish(&update);
    }

    pub(crate) fn reset(&self, status: Status) {
        self.cell.send_replace(status);
    }
}

/// Short text rendering of a status, one distinct form per failure bucket.
pub fn render_status(status: &Status) -> String {
    match status {
        Status::NotStarted => "-".to_string(),
        Status::Waiting => "...".to_string(),
        Status::Latest(StatusUpdate::Count(n)) => n.to_string(),
        Status::Latest(StatusUpdate::Failure(failure)) => match failure.kind() {
            FailureKind::QueryToolMissing => "?missing".to_string(),
            FailureKind::QueryExecutionFailed => "?exec".to_string(),
            FailureKind::QueryOutputMalformed => "?parse".to_string(),
            FailureKind::ProcessExecutionCrashed => "!crash".to_string(),
        },
    }
}
