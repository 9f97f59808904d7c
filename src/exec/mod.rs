// src/exec/mod.rs

//! Process-count query layer.
//!
//! This module is responsible for asking the operating system how many
//! processes match a pattern, by running an external count tool with
//! `tokio::process::Command`.
//!
//! - [`backend`] provides the `ProcessCounter` trait the watch loop talks to,
//!   so tests can swap in a fake counter.
//! - [`pgrep`] is the production implementation (`pgrep -c`).
//! - [`output`] parses the tool's stdout into counts.

pub mod backend;
pub mod output;
pub mod pgrep;

pub use backend::{CountOutcome, ProcessCounter};
pub use output::parse_counts;
pub use pgrep::{classify_exit, PgrepCounter, DEFAULT_OK_EXIT_CODES, DEFAULT_PROGRAM};
