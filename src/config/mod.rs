// src/config/mod.rs

//! TOML configuration: raw model, validation and loading.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{
    parse_duration, ConfigFile, DurationSpec, QuerySection, RawConfigFile, WatchSection,
};
