// src/engine/watch_loop.rs

//! Public lifecycle handle of the watch → debounce → count → report pipeline.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::debounce::DebounceTimer;
use crate::engine::runtime::{QuerySpec, Runtime};
use crate::engine::status::{NullSink, Publisher, StatusSink};
use crate::engine::{advance_state, LoopEvent, LoopState};
use crate::errors::{Result, WatchError};
use crate::exec::ProcessCounter;
use crate::types::{DebounceWindow, MonitoredFileSet, ProcessPattern, Status, UserScope};
use crate::watch::{FileWatcher, WatchOptions};

pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Extra time `stop()` allows the runtime beyond the query grace period.
const STOP_MARGIN: Duration = Duration::from_millis(500);

/// Immutable inputs of one watch loop run.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub paths: MonitoredFileSet,
    pub scope: UserScope,
    pub pattern: ProcessPattern,
    pub debounce: DebounceWindow,
    pub watch: WatchOptions,
    /// Run one query as soon as the loop is running, without a trigger.
    pub query_on_start: bool,
    /// How long `stop()` lets an in-flight query finish before killing it.
    pub shutdown_grace: Duration,
}

impl WatchSettings {
    pub fn new(
        paths: MonitoredFileSet,
        scope: UserScope,
        pattern: ProcessPattern,
        debounce: DebounceWindow,
    ) -> Self {
        Self {
            paths,
            scope,
            pattern,
            debounce,
            watch: WatchOptions::default(),
            query_on_start: false,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

struct RunningLoop {
    control_tx: mpsc::UnboundedSender<LoopEvent>,
    handle: JoinHandle<()>,
}

/// Owner of a running pipeline.
///
/// Consumers either install a [`StatusSink`] to receive every update, or read
/// the latest [`Status`] through [`WatchLoop::status`] /
/// [`WatchLoop::subscribe`]. Dropping the loop aborts the pipeline.
pub struct WatchLoop<C: ProcessCounter + 'static> {
    settings: WatchSettings,
    counter: Arc<C>,
    sink: Arc<dyn StatusSink>,
    status: Arc<watch::Sender<Status>>,
    state: Arc<watch::Sender<LoopState>>,
    running: Option<RunningLoop>,
}

impl<C: ProcessCounter + 'static> fmt::Debug for WatchLoop<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchLoop")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl<C: ProcessCounter + 'static> WatchLoop<C> {
    pub fn new(settings: WatchSettings, counter: C) -> Self {
        let (status, _) = watch::channel(Status::NotStarted);
        let (state, _) = watch::channel(LoopState::Stopped);
        Self {
            settings,
            counter: Arc::new(counter),
            sink: Arc::new(NullSink),
            status: Arc::new(status),
            state: Arc::new(state),
            running: None,
        }
    }

    /// Deliver every update to `sink` (in addition to the latest-status cell).
    pub fn with_sink(mut self, sink: impl StatusSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Snapshot of the latest status.
    pub fn status(&self) -> Status {
        self.status.borrow().clone()
    }

    /// Receiver that always holds the latest status.
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    /// Receiver that follows the lifecycle state.
    pub fn subscribe_state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Start watching. Restarts the loop if it is `Errored`.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(&mut self) -> Result<()> {
        match self.state() {
            LoopState::Stopped => {}
            LoopState::Errored => {
                info!("restarting errored watch loop");
                self.stop().await;
            }
            _ => return Err(WatchError::AlreadyRunning),
        }

        advance_state(&self.state, LoopState::Starting)?;

        let (watcher, triggers) = match FileWatcher::start(&self.settings.paths, self.settings.watch) {
            Ok(started) => started,
            Err(err) => {
                error!(error = %err, "failed to start file watcher");
                advance_state(&self.state, LoopState::Stopped)?;
                return Err(err);
            }
        };

        let (control_tx, control_rx) = mpsc::unbounded_channel::<LoopEvent>();

        let mut debounce = DebounceTimer::new(self.settings.debounce);
        {
            let tx = control_tx.clone();
            debounce.set_callback(move || {
                let _ = tx.send(LoopEvent::QueryDue);
            });
        }

        let publisher = Publisher::new(Arc::clone(&self.status), Arc::clone(&self.sink));
        publisher.reset(Status::Waiting);

        let runtime = Runtime::new(
            Arc::clone(&self.counter),
            QuerySpec {
                scope: self.settings.scope,
                pattern: self.settings.pattern.clone(),
            },
            control_rx,
            triggers,
            watcher,
            debounce,
            publisher,
            Arc::clone(&self.state),
            self.settings.shutdown_grace,
        );

        advance_state(&self.state, LoopState::Running)?;
        let handle = tokio::spawn(runtime.run());

        if self.settings.query_on_start {
            debug!("requesting initial query");
            let _ = control_tx.send(LoopEvent::QueryDue);
        }

        self.running = Some(RunningLoop { control_tx, handle });
        info!(
            paths = self.settings.paths.len(),
            debounce = ?self.settings.debounce.duration(),
            "watch loop running"
        );
        Ok(())
    }

    /// Stop the pipeline and release everything it holds. Idempotent.
    ///
    /// Once this returns, no further update is published.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        if let Err(err) = advance_state(&self.state, LoopState::Stopping) {
            debug!(error = %err, "stop requested from unexpected state");
        }

        let _ = running.control_tx.send(LoopEvent::ShutdownRequested);

        let mut handle = running.handle;
        let budget = self.settings.shutdown_grace + STOP_MARGIN;
        match tokio::time::timeout(budget, &mut handle).await {
            Ok(Ok(())) => debug!("watch loop task joined"),
            Ok(Err(err)) => warn!(error = %err, "watch loop task ended abnormally"),
            Err(_) => {
                warn!(?budget, "watch loop task did not stop in time; aborting it");
                handle.abort();
                let _ = handle.await;
            }
        }

        // Force the final state even if the runtime raced us into `Errored`.
        self.state.send_replace(LoopState::Stopped);
        info!("watch loop stopped");
    }

    /// Wait until the loop is no longer starting or running, and return the
    /// state it ended up in (`Errored` after a crash).
    pub async fn wait(&self) -> LoopState {
        let mut rx = self.state.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            if !state.is_active() {
                return state;
            }
            if rx.changed().await.is_err() {
                return state;
            }
        }
    }
}

impl<C: ProcessCounter + 'static> Drop for WatchLoop<C> {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.handle.abort();
        }
    }
}
