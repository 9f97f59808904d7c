// src/types.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::CountFailure;

/// Which process owners are counted.
///
/// - `CurrentUser`: only processes of the invoking user.
/// - `CurrentUserAndRoot`: the invoking user plus uid 0 (Nix builds run by the
///   daemon show up as root-owned processes).
/// - `All`: no owner restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum UserScope {
    #[serde(rename = "self")]
    CurrentUser,
    #[serde(rename = "self-and-root")]
    CurrentUserAndRoot,
    #[serde(rename = "all")]
    All,
}

impl Default for UserScope {
    fn default() -> Self {
        UserScope::CurrentUserAndRoot
    }
}

impl FromStr for UserScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "self" => Ok(UserScope::CurrentUser),
            "self-and-root" | "self_and_root" => Ok(UserScope::CurrentUserAndRoot),
            "all" => Ok(UserScope::All),
            other => Err(format!(
                "invalid scope: {other} (expected \"self\", \"self-and-root\" or \"all\")"
            )),
        }
    }
}

impl fmt::Display for UserScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserScope::CurrentUser => "self",
            UserScope::CurrentUserAndRoot => "self-and-root",
            UserScope::All => "all",
        };
        f.write_str(s)
    }
}

/// Process-name regular expression handed to the count tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessPattern(String);

impl ProcessPattern {
    /// Wrap a pattern, rejecting the empty string (it would match everything).
    pub fn new(pattern: impl Into<String>) -> Result<Self, String> {
        let pattern = pattern.into();
        if pattern.trim().is_empty() {
            return Err("process pattern must not be empty".to_string());
        }
        Ok(Self(pattern))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quiet period between the last trigger and the count query. Always > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DebounceWindow(Duration);

impl DebounceWindow {
    pub fn new(duration: Duration) -> Result<Self, String> {
        if duration.is_zero() {
            return Err("debounce window must be greater than zero".to_string());
        }
        Ok(Self(duration))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

/// The fixed, ordered, non-empty set of files whose changes trigger a recount.
///
/// Paths do not have to exist when watching starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredFileSet(Vec<PathBuf>);

impl MonitoredFileSet {
    pub fn new<I, P>(paths: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        if paths.is_empty() {
            return Err("at least one path must be monitored".to_string());
        }
        if let Some(bad) = paths.iter().find(|p| p.file_name().is_none()) {
            return Err(format!("monitored path {:?} does not name a file", bad));
        }
        Ok(Self(paths))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which `notify` backend the file watcher uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchBackend {
    /// Platform event API (inotify, FSEvents, ReadDirectoryChangesW, ...).
    Native,
    /// Periodic metadata polling.
    Poll,
}

impl Default for WatchBackend {
    fn default() -> Self {
        WatchBackend::Native
    }
}

/// One result delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Count(u64),
    Failure(CountFailure),
}

/// Value of the single-slot latest-status cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Status {
    /// The loop has never been started.
    #[default]
    NotStarted,
    /// Started, but no query has completed yet.
    Waiting,
    Latest(StatusUpdate),
}
