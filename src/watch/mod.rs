// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Turning the monitored file set into per-directory OS watches (`notify`).
//! - Filtering raw events down to the monitored files.
//! - Retrying directories that do not exist yet, and re-arming watches whose
//!   directory disappeared.
//!
//! It does **not** debounce or count anything; it only turns filesystem
//! changes into [`TriggerEvent`]s.

pub mod path_utils;
pub mod watcher;

pub use watcher::{
    trigger_kind, FileWatcher, TriggerEvent, TriggerKind, TriggerStream, WatchOptions,
    DEFAULT_POLL_INTERVAL, DEFAULT_RETRY_INTERVAL,
};
