// src/config/mod.rs

//! Configuration loading and validation for dockship.
//!
//! - TOML-backed data model (`model.rs`).
//! - Loading, sample generation (`loader.rs`).
//! - Per-mode validation and `~` expansion (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    load_and_validate, load_from_path, load_with_mode, sample_config,
    write_sample_config,
};
pub use model::{ConfigFile, RawConfigFile, TimeoutsSection, UploaderSection, WatcherSection};
pub use validate::{expand_home, validate_config};
