// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;

use crate::config::model::{ConfigFile, ParameterKind, RawConfigFile};
use crate::errors::{PhasegraphError, Result};
use crate::workspace::PHASE_NAME_PREFIX;

const DECLARED_PHASE_NAME: &str = r"^_phase:[a-z][a-z0-9-]*$";

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PhasegraphError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_phases_and_projects(cfg)?;
    validate_settings(cfg)?;
    validate_phase_names(cfg)?;
    validate_phase_dependencies(cfg)?;
    validate_parameters(cfg)?;
    validate_project_dependencies(cfg)?;
    validate_phase_order(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> PhasegraphError {
    PhasegraphError::ConfigError(msg.into())
}

fn ensure_has_phases_and_projects(cfg: &RawConfigFile) -> Result<()> {
    if cfg.phase.is_empty() {
        return Err(config_error(
            "config must contain at least one [phase.<name>] section",
        ));
    }
    if cfg.project.is_empty() {
        return Err(config_error(
            "config must contain at least one [project.<name>] section",
        ));
    }
    Ok(())
}

fn validate_settings(cfg: &RawConfigFile) -> Result<()> {
    if cfg.settings.parallelism == Some(0) {
        return Err(config_error("[settings].parallelism must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_phase_names(cfg: &RawConfigFile) -> Result<()> {
    let declared = Regex::new(DECLARED_PHASE_NAME)
        .map_err(|e| config_error(format!("invalid phase name pattern: {e}")))?;

    for (name, phase) in cfg.phase.iter() {
        if phase.synthetic {
            if name.trim().is_empty() {
                return Err(config_error("synthetic phase names must not be empty"));
            }
            continue;
        }
        if !declared.is_match(name) {
            return Err(config_error(format!(
                "phase '{}' must be named '{}<name>' using lowercase letters, digits and '-'",
                name, PHASE_NAME_PREFIX
            )));
        }
    }
    Ok(())
}

fn validate_phase_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, phase) in cfg.phase.iter() {
        let deps = phase
            .dependencies
            .self_phases
            .iter()
            .map(|d| ("self", d))
            .chain(phase.dependencies.upstream.iter().map(|d| ("upstream", d)));

        for (kind, dep) in deps {
            if !cfg.phase.contains_key(dep) {
                return Err(config_error(format!(
                    "phase '{}' has unknown {} dependency '{}'",
                    name, kind, dep
                )));
            }
        }
        if phase.dependencies.self_phases.iter().any(|d| d == name) {
            return Err(config_error(format!(
                "phase '{}' cannot list itself in `dependencies.self`",
                name
            )));
        }
    }
    Ok(())
}

fn validate_parameters(cfg: &RawConfigFile) -> Result<()> {
    for (long_name, param) in cfg.parameter.iter() {
        if !long_name.starts_with("--") {
            return Err(config_error(format!(
                "parameter '{}' must start with '--'",
                long_name
            )));
        }
        for phase in param.phases.iter() {
            if !cfg.phase.contains_key(phase) {
                return Err(config_error(format!(
                    "parameter '{}' is associated with unknown phase '{}'",
                    long_name, phase
                )));
            }
        }
        match param.kind {
            ParameterKind::Choice => {
                if param.alternatives.is_empty() {
                    return Err(config_error(format!(
                        "choice parameter '{}' must list at least one alternative",
                        long_name
                    )));
                }
                if let Some(default) = param.default_value.as_deref() {
                    if !param.alternatives.iter().any(|a| a == default) {
                        return Err(config_error(format!(
                            "default value '{}' of parameter '{}' is not one of its alternatives",
                            default, long_name
                        )));
                    }
                }
            }
            ParameterKind::Flag | ParameterKind::String | ParameterKind::StringList => {
                if !param.alternatives.is_empty() {
                    return Err(config_error(format!(
                        "only choice parameters may list alternatives ('{}')",
                        long_name
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_project_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, project) in cfg.project.iter() {
        if project.folder.trim().is_empty() {
            return Err(config_error(format!(
                "project '{}' must set a non-empty `folder`",
                name
            )));
        }
        for dep in project.dependencies.iter() {
            if !cfg.project.contains_key(dep) {
                return Err(config_error(format!(
                    "project '{}' has unknown dependency '{}'",
                    name, dep
                )));
            }
            if dep == name {
                return Err(config_error(format!(
                    "project '{}' cannot depend on itself",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_phase_order(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> phase, same-project dependencies only. Upstream
    // dependencies may legitimately point at the phase itself.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.phase.keys() {
        graph.add_node(name.as_str());
    }

    for (name, phase) in cfg.phase.iter() {
        for dep in phase.dependencies.self_phases.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(PhasegraphError::DependencyCycle(format!(
            "cycle detected in phase `dependencies.self` involving phase '{}'",
            cycle.node_id()
        ))),
    }
}
