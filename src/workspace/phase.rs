// src/workspace/phase.rs

use crate::config::PhaseConfig;

/// Well-known prefix of declared phase names (e.g. `_phase:build`).
///
/// Stripped when an operation's display name is rendered.
pub const PHASE_NAME_PREFIX: &str = "_phase:";

/// How a phase is presented in operation display names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseLabel {
    /// The phase stands for the whole project; operations are shown by the
    /// project's name alone.
    Synthetic,
    /// A declared step; `display` is the phase name without its prefix.
    Declared { display: String },
}

/// A named build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    /// Full name; also the script key looked up in each project.
    pub name: String,
    pub label: PhaseLabel,
    /// A project without a script for this phase is a no-op rather than a
    /// configuration error.
    pub ignore_missing_script: bool,
    /// Long names of the custom parameters forwarded to this phase, in
    /// rendering order.
    pub associated_parameters: Vec<String>,
    /// Phases of the same project that must finish first.
    pub self_dependencies: Vec<String>,
    /// Phases of every dependency project that must finish first.
    pub upstream_dependencies: Vec<String>,
}

impl Phase {
    pub fn declared(name: impl Into<String>) -> Self {
        let name = name.into();
        let display = name
            .strip_prefix(PHASE_NAME_PREFIX)
            .unwrap_or(&name)
            .to_string();
        Self::with_label(name, PhaseLabel::Declared { display })
    }

    pub fn synthetic(name: impl Into<String>) -> Self {
        Self::with_label(name.into(), PhaseLabel::Synthetic)
    }

    fn with_label(name: String, label: PhaseLabel) -> Self {
        Self {
            name,
            label,
            ignore_missing_script: false,
            associated_parameters: Vec::new(),
            self_dependencies: Vec::new(),
            upstream_dependencies: Vec::new(),
        }
    }

    /// Build a phase from its validated `[phase.<name>]` section.
    ///
    /// `associated_parameters` is filled in by the workspace, since the
    /// association is declared on the parameters.
    pub fn from_config(name: &str, cfg: &PhaseConfig) -> Self {
        let mut phase = if cfg.synthetic {
            Phase::synthetic(name)
        } else {
            Phase::declared(name)
        };
        phase.ignore_missing_script = cfg.ignore_missing_script;
        phase.self_dependencies = cfg.dependencies.self_phases.clone();
        phase.upstream_dependencies = cfg.dependencies.upstream.clone();
        phase
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.label, PhaseLabel::Synthetic)
    }

    /// Human-readable name of this phase's operation for `project_name`.
    pub fn display_name_for(&self, project_name: &str) -> String {
        match &self.label {
            PhaseLabel::Synthetic => project_name.to_string(),
            PhaseLabel::Declared { display } => format!("{project_name} ({display})"),
        }
    }
}
