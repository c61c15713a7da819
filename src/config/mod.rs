// src/config/mod.rs

//! Configuration loading and validation for phasegraph.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate phase, parameter and project declarations (`validate.rs`).
//! - Read per-project `package.json` files (`package_json.rs`).

pub mod loader;
pub mod model;
pub mod package_json;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_from_path, load_from_str};
pub use model::{
    BuildCacheSection, ConfigFile, ParameterConfig, ParameterKind, PhaseConfig,
    PhaseDependenciesConfig, ProjectConfig, RawConfigFile, SettingsSection,
};
pub use package_json::{PackageJson, read_package_json};
