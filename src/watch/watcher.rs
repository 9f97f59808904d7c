// src/watch/watcher.rs

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::errors::{Result, WatchError};
use crate::types::{MonitoredFileSet, WatchBackend};
use crate::watch::path_utils::group_by_dir;

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How the watcher talks to the OS and how often it retries missing
/// directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub backend: WatchBackend,
    /// Only used by [`WatchBackend::Poll`].
    pub poll_interval: Duration,
    /// Delay between attempts to watch a directory that does not exist yet.
    pub retry_interval: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            backend: WatchBackend::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// What happened to a monitored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Created,
    Modified,
    Removed,
    /// The file already existed when its directory became watchable.
    Appeared,
    /// The backend could not tell what kind of change it saw.
    Unclassified,
}

/// A monitored path changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    /// The monitored path as configured (made absolute).
    pub path: PathBuf,
    pub kind: TriggerKind,
}

/// Stream of triggers produced by a [`FileWatcher`].
pub type TriggerStream = mpsc::UnboundedReceiver<TriggerEvent>;

type SharedWatcher = Arc<Mutex<Option<Box<dyn Watcher + Send>>>>;
type SharedTargets = Arc<Mutex<Vec<DirTarget>>>;

/// A directory we need to watch and the monitored files inside it.
#[derive(Debug)]
struct DirTarget {
    dir: PathBuf,
    /// Canonical path handed to `notify`, once the watch is in place.
    registered: Option<PathBuf>,
    files: Vec<(OsString, PathBuf)>,
    reported_missing: bool,
}

impl DirTarget {
    fn match_file(&self, event_path: &Path) -> Option<&Path> {
        let registered = self.registered.as_deref()?;
        if event_path.parent()? != registered {
            return None;
        }
        let name = event_path.file_name()?;
        self.files
            .iter()
            .find(|(n, _)| n.as_os_str() == name)
            .map(|(_, p)| p.as_path())
    }

    fn is_own_dir(&self, event_path: &Path) -> bool {
        self.registered.as_deref() == Some(event_path)
    }
}

/// Filesystem watcher over a fixed [`MonitoredFileSet`].
///
/// Each monitored file is observed through a non-recursive watch on its
/// parent directory, so deleting and recreating the file keeps working.
/// Directories that do not exist yet are retried in the background until
/// they appear. Dropping the watcher stops it.
pub struct FileWatcher {
    watcher: SharedWatcher,
    tasks: Vec<JoinHandle<()>>,
    stopped: bool,
}

impl fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWatcher")
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Start watching `paths` and return the watcher plus its trigger stream.
    ///
    /// Must be called from within a Tokio runtime. Fails only if the OS
    /// watcher itself cannot be created; missing directories are retried.
    pub fn start(paths: &MonitoredFileSet, options: WatchOptions) -> Result<(Self, TriggerStream)> {
        // Channel from the blocking notify callback into the async world.
        let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel::<TriggerEvent>();

        let watcher: SharedWatcher = Arc::new(Mutex::new(Some(new_backend(options, event_tx)?)));

        let targets: Vec<DirTarget> = group_by_dir(paths.iter())
            .into_iter()
            .map(|(dir, files)| DirTarget {
                dir,
                registered: None,
                files,
                reported_missing: false,
            })
            .collect();
        let targets: SharedTargets = Arc::new(Mutex::new(targets));
        let rearm = Arc::new(Notify::new());

        let pending = register_pending(&watcher, &targets, None).unwrap_or(0);
        info!(
            monitored = paths.len(),
            pending_dirs = pending,
            backend = ?options.backend,
            "file watcher started"
        );

        let forward = tokio::spawn(forward_events(
            event_rx,
            Arc::clone(&watcher),
            Arc::clone(&targets),
            trigger_tx.clone(),
            Arc::clone(&rearm),
        ));
        let retry = tokio::spawn(retry_registrations(
            Arc::clone(&watcher),
            targets,
            trigger_tx,
            rearm,
            options.retry_interval,
        ));

        let handle = Self {
            watcher,
            tasks: vec![forward, retry],
            stopped: false,
        };
        Ok((handle, trigger_rx))
    }

    /// Release the OS watch and stop the background tasks. Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        for task in self.tasks.drain(..) {
            task.abort();
        }
        let inner = lock(&self.watcher).take();
        drop(inner);

        info!("file watcher stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.stopped
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map a `notify` event kind to a trigger, dropping pure access noise.
pub fn trigger_kind(kind: &EventKind) -> Option<TriggerKind> {
    match kind {
        EventKind::Create(_) => Some(TriggerKind::Created),
        EventKind::Modify(_) => Some(TriggerKind::Modified),
        EventKind::Remove(_) => Some(TriggerKind::Removed),
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(TriggerKind::Modified),
        EventKind::Access(_) => None,
        EventKind::Any => Some(TriggerKind::Unclassified),
        _ => None,
    }
}

/// Whether an event on a watched directory itself means the watch no longer
/// observes the configured path: it was deleted, or renamed away (the OS
/// watch then follows the moved inode).
fn detaches_directory(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    )
}

/// Drop the OS watches of directories that were lost. Removed directories
/// have no watch left, so failures are expected and only logged.
fn release_watches(watcher: &SharedWatcher, dirs: &[PathBuf]) {
    let mut guard = lock(watcher);
    let Some(watcher) = guard.as_mut() else {
        return;
    };
    for dir in dirs {
        if let Err(err) = watcher.unwatch(dir) {
            trace!(dir = ?dir, error = %err, "could not release lost watch");
        }
    }
}

fn new_backend(
    options: WatchOptions,
    event_tx: mpsc::UnboundedSender<Event>,
) -> Result<Box<dyn Watcher + Send>> {
    // Called synchronously by notify whenever an event arrives.
    let handler = move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if let Err(err) = event_tx.send(event) {
                debug!("failed to forward notify event: {err}");
            }
        }
        Err(err) => {
            warn!(error = %err, "file watch error");
        }
    };

    let watcher: Box<dyn Watcher + Send> = match options.backend {
        WatchBackend::Native => Box::new(RecommendedWatcher::new(handler, Config::default())?),
        WatchBackend::Poll => Box::new(PollWatcher::new(
            handler,
            Config::default().with_poll_interval(options.poll_interval),
        )?),
    };
    Ok(watcher)
}

/// Try to watch every directory that is not watched yet.
///
/// Returns the number of directories still pending, or `None` once the
/// watcher has been stopped. With `appeared_tx`, monitored files that already
/// exist in a newly watched directory are reported as [`TriggerKind::Appeared`].
fn register_pending(
    watcher: &SharedWatcher,
    targets: &SharedTargets,
    appeared_tx: Option<&mpsc::UnboundedSender<TriggerEvent>>,
) -> Option<usize> {
    let mut targets = lock(targets);
    let mut guard = lock(watcher);
    let watcher = guard.as_mut()?;

    let mut pending = 0;
    for target in targets.iter_mut().filter(|t| t.registered.is_none()) {
        match try_register(&mut **watcher, &target.dir) {
            Ok(canonical) => {
                info!(dir = ?canonical, "watching directory");
                target.reported_missing = false;
                target.registered = Some(canonical);

                if let Some(tx) = appeared_tx {
                    for (_, path) in target.files.iter().filter(|(_, p)| p.exists()) {
                        debug!(path = ?path, "monitored file appeared");
                        let _ = tx.send(TriggerEvent {
                            path: path.clone(),
                            kind: TriggerKind::Appeared,
                        });
                    }
                }
            }
            Err(err) => {
                pending += 1;
                if target.reported_missing {
                    trace!(error = %err, "directory still not watchable");
                } else {
                    info!(error = %err, "directory not watchable yet; will retry");
                    target.reported_missing = true;
                }
            }
        }
    }

    Some(pending)
}

fn try_register(watcher: &mut dyn Watcher, dir: &Path) -> Result<PathBuf> {
    let canonical = dir
        .canonicalize()
        .map_err(|_| WatchError::WatchPathUnavailable(dir.to_path_buf()))?;
    if !canonical.is_dir() {
        return Err(WatchError::WatchPathUnavailable(dir.to_path_buf()));
    }
    watcher.watch(&canonical, RecursiveMode::NonRecursive)?;
    Ok(canonical)
}

/// Consume notify events and forward triggers for monitored files.
async fn forward_events(
    mut event_rx: mpsc::UnboundedReceiver<Event>,
    watcher: SharedWatcher,
    targets: SharedTargets,
    trigger_tx: mpsc::UnboundedSender<TriggerEvent>,
    rearm: Arc<Notify>,
) {
    while let Some(event) = event_rx.recv().await {
        trace!(?event, "received notify event");

        let Some(kind) = trigger_kind(&event.kind) else {
            continue;
        };
        let dir_gone = detaches_directory(&event.kind);

        let mut triggers = Vec::new();
        let mut lost_dirs = Vec::new();
        {
            let mut targets = lock(&targets);
            for path in &event.paths {
                for target in targets.iter_mut() {
                    if let Some(monitored) = target.match_file(path) {
                        triggers.push(TriggerEvent {
                            path: monitored.to_path_buf(),
                            kind,
                        });
                    } else if dir_gone && target.is_own_dir(path) {
                        warn!(dir = ?path, "watched directory was removed or moved; re-arming");
                        if let Some(old) = target.registered.take() {
                            lost_dirs.push(old);
                        }
                    }
                }
            }
        }

        if !lost_dirs.is_empty() {
            release_watches(&watcher, &lost_dirs);
            rearm.notify_one();
        }

        for trigger in triggers {
            debug!(path = ?trigger.path, kind = ?trigger.kind, "monitored file changed");
            if trigger_tx.send(trigger).is_err() {
                debug!("trigger stream closed; stopping event forwarding");
                return;
            }
        }
    }

    debug!("file watcher event loop ended");
}

/// Keep retrying directories that are not watchable yet.
async fn retry_registrations(
    watcher: SharedWatcher,
    targets: SharedTargets,
    trigger_tx: mpsc::UnboundedSender<TriggerEvent>,
    rearm: Arc<Notify>,
    interval: Duration,
) {
    loop {
        let Some(pending) = register_pending(&watcher, &targets, Some(&trigger_tx)) else {
            break;
        };

        if pending == 0 {
            rearm.notified().await;
        } else {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = rearm.notified() => {}
            }
        }
    }

    debug!("watch registration loop ended");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("file watcher mutex poisoned; continuing with inner state");
            poisoned.into_inner()
        }
    }
}
