// src/engine/core.rs

//! Pure core state machine of the watch loop.
//!
//! `CoreLoop` consumes [`LoopEvent`]s and produces:
//! - an updated core state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) owns the timer, the watcher
//! and the query task; the core only decides. It has no channels, no Tokio
//! types, and performs no IO, so it can be tested exhaustively.

use crate::engine::event_handlers::{
    handle_helper_crash, handle_query_due, handle_query_finished, handle_trigger, CoreStep,
};
use crate::engine::{LoopEvent, LoopState};

/// Serialization state of the count queries: at most one runs, at most one
/// more is queued behind it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuerySlot {
    pub in_flight: bool,
    pub follow_up: bool,
}

#[derive(Debug)]
pub struct CoreLoop {
    state: LoopState,
    slot: QuerySlot,
}

impl Default for CoreLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreLoop {
    /// A core for a loop that just reached `Running`.
    pub fn new() -> Self {
        Self {
            state: LoopState::Running,
            slot: QuerySlot::default(),
        }
    }

    /// `Running`, or `Errored` once the query mechanism crashed.
    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn query_in_flight(&self) -> bool {
        self.slot.in_flight
    }

    pub fn follow_up_pending(&self) -> bool {
        self.slot.follow_up
    }

    /// Handle a single loop event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: LoopEvent) -> CoreStep {
        if self.state == LoopState::Errored {
            return CoreStep::halt(Vec::new());
        }

        match event {
            LoopEvent::Triggered(trigger) => handle_trigger(trigger),
            LoopEvent::QueryDue => handle_query_due(&mut self.slot),
            LoopEvent::QueryFinished(outcome) => {
                handle_query_finished(&mut self.state, &mut self.slot, outcome)
            }
            LoopEvent::HelperCrashed(reason) => {
                handle_helper_crash(&mut self.state, &mut self.slot, reason)
            }
            LoopEvent::ShutdownRequested => CoreStep::halt(Vec::new()),
        }
    }
}
