// src/config/mod.rs

//! Configuration loading and validation for the `dagrun` binary.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it and turn it into a `TaskGraph` + `ExecutorOptions`
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, SinkSection, TaskConfig};
pub use validate::validate_config;
