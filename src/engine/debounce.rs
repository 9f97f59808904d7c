// src/engine/debounce.rs

//! Trailing-edge debounce timer.
//!
//! Every [`DebounceTimer::on_trigger`] cancels the pending invocation (if any)
//! and schedules the callback one window after *this* trigger. A burst of
//! triggers therefore yields exactly one callback, one window after the last
//! trigger of the burst. If triggers never pause for a full window the
//! callback never runs.
//!
//! The timer knows nothing about process counting; it only calls whatever
//! callback it was given.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::types::DebounceWindow;

pub type DebounceCallback = Arc<dyn Fn() + Send + Sync>;

pub struct DebounceTimer {
    window: DebounceWindow,
    callback: Option<DebounceCallback>,
    pending: Option<JoinHandle<()>>,
}

impl fmt::Debug for DebounceTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebounceTimer")
            .field("window", &self.window)
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}

impl DebounceTimer {
    pub fn new(window: DebounceWindow) -> Self {
        Self {
            window,
            callback: None,
            pending: None,
        }
    }

    pub fn window(&self) -> DebounceWindow {
        self.window
    }

    /// Install the action run at the end of each quiet period.
    ///
    /// Replacing the callback does not affect an already scheduled run.
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
    }

    /// Restart the quiet period. Must be called within a Tokio runtime.
    pub fn on_trigger(&mut self) {
        self.cancel();

        let Some(callback) = self.callback.clone() else {
            warn!("debounce trigger without a callback; ignoring");
            return;
        };

        let delay = self.window.duration();
        trace!(?delay, "debounce window (re)started");
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        }));
    }

    /// Drop the pending invocation, if any.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    /// Whether a callback is scheduled and has not run yet.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
