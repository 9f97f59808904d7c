// src/engine/event_handlers.rs

//! Event handling logic for the core loop.

use tracing::{debug, error, info};

use crate::engine::core::QuerySlot;
use crate::engine::LoopState;
use crate::errors::CountFailure;
use crate::exec::CountOutcome;
use crate::types::StatusUpdate;
use crate::watch::TriggerEvent;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Restart the debounce window.
    ArmDebounce,
    /// Spawn a process count query.
    StartQuery,
    /// Hand this update to the consumer and the latest-status cell.
    Publish(StatusUpdate),
}

/// Decision returned by the core after handling a single `LoopEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub(crate) fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub(crate) fn halt(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: false,
        }
    }
}

/// A monitored file changed: restart the quiet period.
///
/// Triggers are never dropped, even while a query runs; the debounce timer
/// will ask for a follow-up query once things settle.
pub fn handle_trigger(trigger: TriggerEvent) -> CoreStep {
    debug!(path = ?trigger.path, kind = ?trigger.kind, "trigger received");
    CoreStep::running(vec![CoreCommand::ArmDebounce])
}

/// The quiet period is over: query now, or right after the running query.
pub fn handle_query_due(slot: &mut QuerySlot) -> CoreStep {
    if slot.in_flight {
        debug!("query already running; queueing one follow-up query");
        slot.follow_up = true;
        return CoreStep::running(Vec::new());
    }

    slot.in_flight = true;
    CoreStep::running(vec![CoreCommand::StartQuery])
}

/// A query finished: publish every count (or the failure), then start the
/// queued follow-up query if there is one.
pub fn handle_query_finished(
    state: &mut LoopState,
    slot: &mut QuerySlot,
    outcome: CountOutcome,
) -> CoreStep {
    slot.in_flight = false;

    let mut commands = Vec::new();
    match outcome {
        Ok(counts) => {
            if counts.len() > 1 {
                debug!(?counts, "query produced several counts; publishing each");
            }
            commands.extend(
                counts
                    .into_iter()
                    .map(|n| CoreCommand::Publish(StatusUpdate::Count(n))),
            );
        }
        Err(failure) if failure.is_fatal() => {
            return handle_crash(state, slot, failure);
        }
        Err(failure) => {
            info!(error = %failure, "query failed; waiting for the next trigger");
            commands.push(CoreCommand::Publish(StatusUpdate::Failure(failure)));
        }
    }

    if slot.follow_up {
        slot.follow_up = false;
        slot.in_flight = true;
        commands.push(CoreCommand::StartQuery);
    }

    CoreStep::running(commands)
}

/// The query mechanism itself died: report once and halt.
pub fn handle_helper_crash(state: &mut LoopState, slot: &mut QuerySlot, reason: String) -> CoreStep {
    handle_crash(state, slot, CountFailure::ProcessExecutionCrashed(reason))
}

fn handle_crash(state: &mut LoopState, slot: &mut QuerySlot, failure: CountFailure) -> CoreStep {
    error!(error = %failure, "process count mechanism crashed; halting watch loop");
    *state = LoopState::Errored;
    *slot = QuerySlot::default();
    CoreStep::halt(vec![CoreCommand::Publish(StatusUpdate::Failure(failure))])
}
