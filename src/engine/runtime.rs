// src/engine/runtime.rs

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::engine::core::CoreLoop;
use crate::engine::debounce::DebounceTimer;
use crate::engine::status::Publisher;
use crate::engine::{advance_state, CoreCommand, LoopEvent, LoopState};
use crate::exec::{CountOutcome, ProcessCounter};
use crate::types::{ProcessPattern, UserScope};
use crate::watch::{FileWatcher, TriggerEvent, TriggerStream};

/// What to count; fixed for one run.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub scope: UserScope,
    pub pattern: ProcessPattern,
}

/// Drives the core loop in response to triggers, timer expiries and query
/// completions, and performs the IO the core asks for.
///
/// This is a pure IO shell around [`CoreLoop`], which holds all the loop
/// semantics. The runtime owns everything with a lifetime: the file watcher,
/// the debounce timer and the in-flight query task. When it exits, all of
/// them are released.
pub struct Runtime<C: ProcessCounter + 'static> {
    core: CoreLoop,
    counter: Arc<C>,
    query: QuerySpec,
    control_rx: mpsc::UnboundedReceiver<LoopEvent>,
    triggers: TriggerStream,
    watcher: FileWatcher,
    debounce: DebounceTimer,
    active: Option<JoinHandle<CountOutcome>>,
    publisher: Publisher,
    state: Arc<watch::Sender<LoopState>>,
    shutdown_grace: Duration,
}

impl<C: ProcessCounter + 'static> fmt::Debug for Runtime<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("query", &self.query)
            .field("watcher", &self.watcher)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

/// What woke the runtime up.
enum Wake {
    Control(Option<LoopEvent>),
    Trigger(Option<TriggerEvent>),
    Query(Result<CountOutcome, JoinError>),
}

impl<C: ProcessCounter + 'static> Runtime<C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        counter: Arc<C>,
        query: QuerySpec,
        control_rx: mpsc::UnboundedReceiver<LoopEvent>,
        triggers: TriggerStream,
        watcher: FileWatcher,
        debounce: DebounceTimer,
        publisher: Publisher,
        state: Arc<watch::Sender<LoopState>>,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            core: CoreLoop::new(),
            counter,
            query,
            control_rx,
            triggers,
            watcher,
            debounce,
            active: None,
            publisher,
            state,
            shutdown_grace,
        }
    }

    /// Main event loop.
    ///
    /// - Waits on control events, triggers and the in-flight query at once,
    ///   so a slow query never holds up trigger ingestion.
    /// - Feeds each event into the core and executes the returned commands.
    /// - On exit, cancels the timer, stops the watcher and winds down any
    ///   in-flight query.
    pub async fn run(mut self) {
        info!(scope = %self.query.scope, pattern = %self.query.pattern, "watch loop started");
        let mut triggers_open = true;

        loop {
            let wake = tokio::select! {
                biased;
                event = self.control_rx.recv() => Wake::Control(event),
                joined = wait_for_query(&mut self.active) => Wake::Query(joined),
                trigger = self.triggers.recv(), if triggers_open => Wake::Trigger(trigger),
            };

            let event = match wake {
                Wake::Control(Some(event)) => event,
                Wake::Control(None) => {
                    debug!("control channel closed; shutting down");
                    LoopEvent::ShutdownRequested
                }
                Wake::Trigger(Some(trigger)) => LoopEvent::Triggered(trigger),
                Wake::Trigger(None) => {
                    triggers_open = false;
                    LoopEvent::HelperCrashed("file watcher trigger stream ended".to_string())
                }
                Wake::Query(joined) => {
                    self.active = None;
                    match joined {
                        Ok(outcome) => LoopEvent::QueryFinished(outcome),
                        Err(err) => LoopEvent::HelperCrashed(describe_join_error(err)),
                    }
                }
            };

            debug!(?event, "watch loop received event");

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command);
            }

            if self.core.state() == LoopState::Errored {
                if let Err(err) = advance_state(&self.state, LoopState::Errored) {
                    debug!(error = %err, "could not record errored state");
                }
            }

            if !step.keep_running {
                break;
            }
        }

        self.shutdown().await;
        info!("watch loop exiting");
    }

    /// Execute a single command from the core.
    fn execute_command(&mut self, command: CoreCommand) {
        match command {
            CoreCommand::ArmDebounce => self.debounce.on_trigger(),
            CoreCommand::StartQuery => self.spawn_query(),
            CoreCommand::Publish(update) => self.publisher.publish(update),
        }
    }

    fn spawn_query(&mut self) {
        if let Some(previous) = self.active.take() {
            warn!("query started while another was in flight; aborting the older one");
            previous.abort();
        }

        let counter = Arc::clone(&self.counter);
        let QuerySpec { scope, pattern } = self.query.clone();
        debug!("spawning process count query");
        self.active = Some(tokio::spawn(async move {
            counter.count(scope, &pattern).await
        }));
    }

    async fn shutdown(&mut self) {
        self.debounce.cancel();
        self.watcher.stop();

        let Some(mut handle) = self.active.take() else {
            return;
        };

        match tokio::time::timeout(self.shutdown_grace, &mut handle).await {
            Ok(_) => debug!("in-flight query finished during shutdown; result discarded"),
            Err(_) => {
                warn!(
                    grace = ?self.shutdown_grace,
                    "in-flight query exceeded the shutdown grace period; killing it"
                );
                handle.abort();
                let _ = handle.await;
            }
        }
    }
}

impl<C: ProcessCounter + 'static> Drop for Runtime<C> {
    /// Dropping a `JoinHandle` only detaches the task, so an abandoned
    /// runtime (its owner aborted it) must cancel the query explicitly.
    fn drop(&mut self) {
        if let Some(handle) = self.active.take() {
            debug!("runtime dropped with a query in flight; aborting it");
            handle.abort();
        }
    }
}

/// Resolve when the in-flight query finishes; pend forever if there is none.
async fn wait_for_query(
    active: &mut Option<JoinHandle<CountOutcome>>,
) -> Result<CountOutcome, JoinError> {
    match active {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_cancelled() {
        return "query task was cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => format!("query task panicked: {}", panic_message(&*payload)),
        Err(err) => format!("query task failed: {err}"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
