// src/config/validate.rs

use std::path::PathBuf;

use regex::Regex;

use crate::config::model::{ConfigFile, DurationSpec, RawConfigFile};
use crate::engine::WatchSettings;
use crate::errors::{Result, WatchError};
use crate::types::{DebounceWindow, MonitoredFileSet, ProcessPattern};
use crate::watch::WatchOptions;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = WatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let paths = MonitoredFileSet::new(raw.watch.paths.iter().cloned())
            .map_err(|e| config_error("[watch].paths", e))?;

        let debounce = duration_field("[watch].debounce", &raw.watch.debounce)?;
        let debounce =
            DebounceWindow::new(debounce).map_err(|e| config_error("[watch].debounce", e))?;

        let watch = WatchOptions {
            backend: raw.watch.backend,
            poll_interval: positive_duration("[watch].poll_interval", &raw.watch.poll_interval)?,
            retry_interval: positive_duration("[watch].retry_interval", &raw.watch.retry_interval)?,
        };

        let pattern = validate_pattern(&raw.query.pattern)?;
        let program = validate_program(&raw.query.program)?;

        if raw.query.ok_exit_codes.is_empty() {
            return Err(config_error(
                "[query].ok_exit_codes",
                "at least one exit code must be accepted",
            ));
        }

        let shutdown_grace = duration_field("[query].shutdown_grace", &raw.query.shutdown_grace)?;

        let mut settings = WatchSettings::new(paths, raw.query.scope, pattern, debounce);
        settings.watch = watch;
        settings.query_on_start = raw.query.on_start;
        settings.shutdown_grace = shutdown_grace;

        Ok(ConfigFile {
            settings,
            program,
            ok_exit_codes: raw.query.ok_exit_codes,
        })
    }
}

fn config_error(field: &str, reason: impl std::fmt::Display) -> WatchError {
    WatchError::ConfigError(format!("{field}: {reason}"))
}

fn duration_field(field: &str, spec: &DurationSpec) -> Result<std::time::Duration> {
    spec.to_duration().map_err(|e| config_error(field, e))
}

fn positive_duration(field: &str, spec: &DurationSpec) -> Result<std::time::Duration> {
    let duration = duration_field(field, spec)?;
    if duration.is_zero() {
        return Err(config_error(field, "must be greater than zero"));
    }
    Ok(duration)
}

/// The pattern goes to the count tool verbatim, but it must at least be a
/// valid (extended) regular expression.
fn validate_pattern(pattern: &str) -> Result<ProcessPattern> {
    let checked = ProcessPattern::new(pattern).map_err(|e| config_error("[query].pattern", e))?;
    Regex::new(checked.as_str()).map_err(|e| config_error("[query].pattern", e))?;
    Ok(checked)
}

fn validate_program(program: &str) -> Result<PathBuf> {
    let program = program.trim();
    if program.is_empty() {
        return Err(config_error("[query].program", "must not be empty"));
    }
    Ok(PathBuf::from(program))
}
