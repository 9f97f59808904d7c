// src/engine/mod.rs

//! Orchestration engine for buildwatch.
//!
//! This module ties together:
//! - the file watcher's trigger stream
//! - the debounce timer (one recount per burst of changes)
//! - the process counter (one query at a time)
//! - publishing of status updates to the consumer
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]; [`watch_loop`] is the public lifecycle handle.

use tokio::sync::watch;
use tracing::debug;

use crate::errors::{Result, WatchError};
use crate::exec::CountOutcome;
use crate::watch::TriggerEvent;

/// Lifecycle state of a [`WatchLoop`].
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`, plus
/// `Running -> Errored` when the query mechanism itself dies. `Errored` stays
/// put until the loop is stopped or restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Errored,
}

impl LoopState {
    pub fn can_transition_to(self, next: LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Running, Errored)
                | (Errored, Stopping)
                | (Stopping, Stopped)
        )
    }

    /// Whether the pipeline task is (supposed to be) alive.
    pub fn is_active(self) -> bool {
        matches!(self, LoopState::Starting | LoopState::Running)
    }
}

/// Atomically move the shared state to `next`, if that transition is legal.
pub(crate) fn advance_state(state: &watch::Sender<LoopState>, next: LoopState) -> Result<()> {
    let mut outcome = Ok(());
    state.send_if_modified(|current| {
        if current.can_transition_to(next) {
            debug!(from = ?*current, to = ?next, "watch loop state change");
            *current = next;
            true
        } else {
            outcome = Err(WatchError::InvalidTransition {
                from: *current,
                to: next,
            });
            false
        }
    });
    outcome
}

/// Events flowing into the loop from the watcher, the debounce timer, the
/// query task and the owning handle.
#[derive(Debug, Clone)]
pub enum LoopEvent {
    /// A monitored file changed.
    Triggered(TriggerEvent),
    /// The debounce window elapsed (or an immediate query was requested).
    QueryDue,
    /// The in-flight count query finished.
    QueryFinished(CountOutcome),
    /// The query helper task (or the trigger stream) died.
    HelperCrashed(String),
    /// Graceful shutdown requested by `stop()`.
    ShutdownRequested,
}

pub mod core;
pub mod debounce;
pub mod event_handlers;
pub mod runtime;
pub mod status;
pub mod watch_loop;

pub use self::core::CoreLoop;
pub use debounce::DebounceTimer;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
pub use status::{render_status, NullSink, StatusSink};
pub use watch_loop::{WatchLoop, WatchSettings};
