// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::WatchSettings;
use crate::exec::PgrepCounter;
use crate::types::{UserScope, WatchBackend};

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [watch]
/// paths = ["/nix/var/nix/db/db.sqlite"]
/// debounce = 0.025
///
/// [query]
/// pattern = "^nix-daemon$"
/// scope = "self-and-root"
/// ```
///
/// Use `ConfigFile::try_from` (see `config::validate`) to get a checked
/// configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub query: QuerySection,
}

/// A duration given either as (fractional) seconds or as a string with a
/// unit suffix: `0.025`, `2`, `"25ms"`, `"1.5s"`, `"2m"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DurationSpec {
    Seconds(f64),
    Text(String),
}

impl DurationSpec {
    pub fn to_duration(&self) -> Result<Duration, String> {
        match self {
            DurationSpec::Seconds(secs) => {
                if !secs.is_finite() || *secs < 0.0 {
                    return Err(format!("invalid duration: {secs} seconds"));
                }
                secs_to_duration(*secs)
            }
            DurationSpec::Text(text) => parse_duration(text),
        }
    }
}

impl From<Duration> for DurationSpec {
    fn from(value: Duration) -> Self {
        DurationSpec::Seconds(value.as_secs_f64())
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Files whose changes trigger a recount. They need not exist yet.
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    #[serde(default = "default_debounce")]
    pub debounce: DurationSpec,

    /// How often to retry watching a directory that does not exist.
    #[serde(default = "default_retry_interval")]
    pub retry_interval: DurationSpec,

    #[serde(default)]
    pub backend: WatchBackend,

    /// Only used by the `poll` backend.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: DurationSpec,
}

fn default_debounce() -> DurationSpec {
    DurationSpec::Text("25ms".to_string())
}

fn default_retry_interval() -> DurationSpec {
    DurationSpec::Text("1s".to_string())
}

fn default_poll_interval() -> DurationSpec {
    DurationSpec::Text("500ms".to_string())
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            debounce: default_debounce(),
            retry_interval: default_retry_interval(),
            backend: WatchBackend::default(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// `[query]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct QuerySection {
    /// The count tool; looked up on `PATH` unless it contains a slash.
    #[serde(default = "default_program")]
    pub program: String,

    /// Process-name regular expression, e.g. `"^nix-daemon$"`.
    #[serde(default)]
    pub pattern: String,

    #[serde(default)]
    pub scope: UserScope,

    /// Exit codes that still mean "here is a count" (`pgrep` exits 1 when
    /// nothing matched).
    #[serde(default = "default_ok_exit_codes")]
    pub ok_exit_codes: Vec<i32>,

    /// Run one query right after start, without waiting for a change.
    #[serde(default)]
    pub on_start: bool,

    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: DurationSpec,
}

fn default_program() -> String {
    crate::exec::DEFAULT_PROGRAM.to_string()
}

fn default_ok_exit_codes() -> Vec<i32> {
    crate::exec::DEFAULT_OK_EXIT_CODES.to_vec()
}

fn default_shutdown_grace() -> DurationSpec {
    DurationSpec::Text("500ms".to_string())
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            program: default_program(),
            pattern: String::new(),
            scope: UserScope::default(),
            ok_exit_codes: default_ok_exit_codes(),
            on_start: false,
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

/// Parse `"<number><unit>"` with unit `ms`, `s`, `m` or `h`. The number may
/// have a fractional part.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: f64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs = match unit.as_str() {
        "ms" => value / 1000.0,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 60.0 * 60.0,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    secs_to_duration(secs)
}

/// Round to whole nanoseconds so `0.025` and `"25ms"` agree exactly.
fn secs_to_duration(secs: f64) -> Result<Duration, String> {
    let nanos = (secs * 1e9).round();
    if !nanos.is_finite() || nanos < 0.0 || nanos >= u64::MAX as f64 {
        return Err(format!("duration of {secs} seconds is out of range"));
    }
    Ok(Duration::from_nanos(nanos as u64))
}

/// Validated configuration, ready to build a watch loop from.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub settings: WatchSettings,
    pub program: PathBuf,
    pub ok_exit_codes: Vec<i32>,
}

impl ConfigFile {
    /// The production counter described by `[query]`.
    pub fn counter(&self) -> PgrepCounter {
        PgrepCounter::new(&self.program).with_ok_exit_codes(self.ok_exit_codes.clone())
    }
}
