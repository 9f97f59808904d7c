// src/errors.rs

//! Crate-wide error types.
//!
//! [`WatchError`] covers configuration and lifecycle problems. Failures of a
//! single process-count query are *not* errors in this sense: they are
//! reported to the consumer as [`CountFailure`]s inside a `StatusUpdate`.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::LoopState;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("File watch error: {0}")]
    NotifyError(#[from] notify::Error),

    /// The directory holding a monitored path does not exist (yet).
    ///
    /// Only ever logged: the watcher keeps retrying the registration.
    #[error("Watch path unavailable: {0}")]
    WatchPathUnavailable(PathBuf),

    #[error("watch loop is already running")]
    AlreadyRunning,

    #[error("invalid watch loop transition from {from:?} to {to:?}")]
    InvalidTransition { from: LoopState, to: LoopState },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Why a process-count query produced no usable count.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CountFailure {
    /// The count tool could not be found (spawn `NotFound`, or exit 127).
    #[error("process count tool is missing: {0}")]
    QueryToolMissing(String),

    /// The tool could not be launched or exited with an unexpected status.
    #[error("process count query failed: {0}")]
    QueryExecutionFailed(String),

    /// The tool's stdout was not a list of non-negative integers.
    #[error("process count output is malformed: {0}")]
    QueryOutputMalformed(String),

    /// The helper task running the queries died. Fatal for the loop.
    #[error("process count helper crashed: {0}")]
    ProcessExecutionCrashed(String),
}

/// Taxonomy bucket of a [`CountFailure`], without the reason text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    QueryToolMissing,
    QueryExecutionFailed,
    QueryOutputMalformed,
    ProcessExecutionCrashed,
}

impl CountFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            CountFailure::QueryToolMissing(_) => FailureKind::QueryToolMissing,
            CountFailure::QueryExecutionFailed(_) => FailureKind::QueryExecutionFailed,
            CountFailure::QueryOutputMalformed(_) => FailureKind::QueryOutputMalformed,
            CountFailure::ProcessExecutionCrashed(_) => FailureKind::ProcessExecutionCrashed,
        }
    }

    /// Whether the loop can keep running after this failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CountFailure::ProcessExecutionCrashed(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WatchError>;
