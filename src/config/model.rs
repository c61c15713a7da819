// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::CacheMode;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [settings]
/// parallelism = 4
///
/// [phase."_phase:build"]
/// dependencies = { self = ["_phase:lint"], upstream = ["_phase:build"] }
///
/// [parameter."--production"]
/// kind = "flag"
/// phases = ["_phase:build"]
///
/// [project.alpha]
/// folder = "packages/alpha"
/// dependencies = ["beta"]
/// ```
///
/// Only `[phase.*]` and `[project.*]` are required.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub settings: SettingsSection,

    #[serde(default)]
    pub phase: BTreeMap<String, PhaseConfig>,

    #[serde(default)]
    pub parameter: BTreeMap<String, ParameterConfig>,

    #[serde(default)]
    pub project: BTreeMap<String, ProjectConfig>,
}

/// A validated configuration file.
///
/// Can only be constructed through `TryFrom<RawConfigFile>`, which runs
/// every check in `config::validate`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub settings: SettingsSection,
    pub phase: BTreeMap<String, PhaseConfig>,
    pub parameter: BTreeMap<String, ParameterConfig>,
    pub project: BTreeMap<String, ProjectConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            settings: raw.settings,
            phase: raw.phase,
            parameter: raw.parameter,
            project: raw.project,
        }
    }
}

/// `[settings]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsSection {
    /// Maximum number of operations executing at once.
    ///
    /// `None` means "use the available hardware parallelism".
    #[serde(default)]
    pub parallelism: Option<usize>,

    /// Whether shell runners may skip work for unchanged projects.
    #[serde(default = "default_allow_incremental")]
    pub allow_incremental: bool,

    /// Time between the terminate signal and a forced kill on cancellation.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Globs (relative to each project folder) ignored when fingerprinting.
    #[serde(default)]
    pub fingerprint_exclude: Vec<String>,

    /// Build cache; absent means caching is disabled.
    #[serde(default)]
    pub build_cache: Option<BuildCacheSection>,
}

fn default_allow_incremental() -> bool {
    true
}

fn default_grace_period_ms() -> u64 {
    5_000
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            parallelism: None,
            allow_incremental: default_allow_incremental(),
            grace_period_ms: default_grace_period_ms(),
            fingerprint_exclude: Vec::new(),
            build_cache: None,
        }
    }
}

/// `[settings.build_cache]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildCacheSection {
    #[serde(default)]
    pub mode: CacheMode,

    /// Cache directory, relative to the config file's directory.
    ///
    /// Defaults to `.phasegraph/cache`.
    #[serde(default)]
    pub dir: Option<String>,
}

/// `[phase.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhaseConfig {
    /// A synthetic phase stands for "run the project" as a whole and may use
    /// any name; declared phases must be named `_phase:<name>`.
    #[serde(default)]
    pub synthetic: bool,

    /// If true, projects without a script for this phase are treated as
    /// no-ops instead of a configuration error.
    #[serde(default)]
    pub ignore_missing_script: bool,

    #[serde(default)]
    pub dependencies: PhaseDependenciesConfig,
}

/// `dependencies = { self = [...], upstream = [...] }` of a phase.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhaseDependenciesConfig {
    /// Phases of the same project that must finish first.
    #[serde(default, rename = "self")]
    pub self_phases: Vec<String>,

    /// Phases of every dependency project that must finish first.
    #[serde(default)]
    pub upstream: Vec<String>,
}

/// Kind of a custom parameter, which decides how its value is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Flag,
    String,
    Choice,
    StringList,
}

/// `[parameter."<long-name>"]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterConfig {
    pub kind: ParameterKind,

    /// Phases whose commands receive this parameter.
    #[serde(default)]
    pub phases: Vec<String>,

    /// Allowed values for `kind = "choice"`.
    #[serde(default)]
    pub alternatives: Vec<String>,

    /// Value used for `choice` parameters when none is given.
    #[serde(default)]
    pub default_value: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// `[project.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    /// Project folder, relative to the config file's directory.
    pub folder: String,

    /// Local projects this project depends on, in addition to the ones found
    /// in its `package.json`.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Inline scripts. When absent, scripts are read from
    /// `<folder>/package.json`.
    #[serde(default)]
    pub scripts: Option<BTreeMap<String, String>>,
}
