// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Read and deserialize a configuration file, without semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_str(&contents)
}

/// Deserialize configuration text.
pub fn parse_str(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file and validate it.
///
/// This is the entry point the binary uses: it reads TOML, applies defaults
/// and rejects empty path sets, bad patterns, zero windows and unparseable
/// durations.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw_config = load_from_path(path)?;
    let config = ConfigFile::try_from(raw_config)?;
    debug!(path = ?path, "configuration loaded");
    Ok(config)
}

/// `buildwatch.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("buildwatch.toml")
}
