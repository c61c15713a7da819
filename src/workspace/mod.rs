// src/workspace/mod.rs

//! In-memory model of the monorepo for one run: phases, projects and bound
//! custom parameters.
//!
//! Everything here is immutable once built. Projects and phases are shared
//! behind `Arc` so that runners and graph nodes can hold them cheaply.

pub mod parameter;
pub mod phase;
pub mod project;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{ConfigFile, ProjectConfig, SettingsSection, read_package_json};
use crate::errors::{PhasegraphError, Result};

pub use parameter::{CustomParameter, ParameterArg, ParameterSet, ParameterValue};
pub use phase::{PHASE_NAME_PREFIX, Phase, PhaseLabel};
pub use project::{Project, ScriptLookup};

#[derive(Debug, Clone)]
pub struct Workspace {
    /// Directory the config file lives in.
    pub root: PathBuf,
    pub settings: SettingsSection,
    pub phases: BTreeMap<String, Arc<Phase>>,
    pub projects: BTreeMap<String, Arc<Project>>,
    pub parameters: Arc<ParameterSet>,
}

impl Workspace {
    /// Assemble a workspace from hand-built parts.
    ///
    /// `associated_parameters` of each phase is recomputed from `parameters`
    /// unless the phase already lists some.
    pub fn new(
        root: impl Into<PathBuf>,
        settings: SettingsSection,
        phases: Vec<Phase>,
        projects: Vec<Project>,
        parameters: ParameterSet,
    ) -> Self {
        let phases = phases
            .into_iter()
            .map(|mut phase| {
                if phase.associated_parameters.is_empty() {
                    phase.associated_parameters = parameters.names_for_phase(&phase.name);
                }
                (phase.name.clone(), Arc::new(phase))
            })
            .collect();
        let projects = projects
            .into_iter()
            .map(|p| (p.name.clone(), Arc::new(p)))
            .collect();

        Self {
            root: root.into(),
            settings,
            phases,
            projects,
            parameters: Arc::new(parameters),
        }
    }

    /// Build the workspace described by a validated config.
    ///
    /// Reads each project's `package.json` (unless it declares inline
    /// scripts) and binds the custom parameters given on the command line.
    pub fn from_config(root: &Path, cfg: &ConfigFile, args: &[ParameterArg]) -> Result<Self> {
        let parameters = ParameterSet::bind(&cfg.parameter, args)?;

        let phases = cfg
            .phase
            .iter()
            .map(|(name, pc)| Phase::from_config(name, pc))
            .collect();

        let mut projects = Vec::with_capacity(cfg.project.len());
        for (name, pc) in cfg.project.iter() {
            projects.push(load_project(root, name, pc, cfg)?);
        }

        Ok(Self::new(root, cfg.settings.clone(), phases, projects, parameters))
    }

    pub fn phase(&self, name: &str) -> Result<&Arc<Phase>> {
        self.phases
            .get(name)
            .ok_or_else(|| PhasegraphError::UnknownPhase(name.to_string()))
    }

    pub fn project(&self, name: &str) -> Result<&Arc<Project>> {
        self.projects
            .get(name)
            .ok_or_else(|| PhasegraphError::UnknownProject(name.to_string()))
    }

    /// `roots` plus every project they transitively depend on.
    pub fn with_transitive_dependencies<'a, I>(&self, roots: I) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut selected = BTreeSet::new();
        let mut stack: Vec<String> = Vec::new();
        for root in roots {
            self.project(root)?;
            stack.push(root.to_string());
        }

        while let Some(name) = stack.pop() {
            if !selected.insert(name.clone()) {
                continue;
            }
            if let Some(project) = self.projects.get(&name) {
                stack.extend(project.dependencies.iter().cloned());
            }
        }

        Ok(selected)
    }
}

fn load_project(root: &Path, name: &str, pc: &ProjectConfig, cfg: &ConfigFile) -> Result<Project> {
    let folder = root.join(&pc.folder);
    let mut project = Project::new(name, folder.clone());
    project.dependencies.extend(pc.dependencies.iter().cloned());

    let package_json = read_package_json(&folder)?;

    match (&pc.scripts, &package_json) {
        (Some(inline), _) => {
            project.scripts = inline
                .iter()
                .map(|(k, v)| (k.clone(), Some(v.clone())))
                .collect();
        }
        (None, Some(pkg)) => {
            project.scripts = pkg.scripts.clone();
        }
        (None, None) => {
            warn!(
                project = %name,
                folder = %folder.display(),
                "project has neither inline scripts nor a package.json; every phase will see a missing script"
            );
        }
    }

    if let Some(pkg) = &package_json {
        if let Some(pkg_name) = pkg.name.as_deref() {
            if pkg_name != name {
                debug!(project = %name, package_name = %pkg_name, "package.json name differs from project key");
            }
        }
        for dep in pkg.dependency_names() {
            if dep != name && cfg.project.contains_key(dep) {
                project.dependencies.insert(dep.to_string());
            }
        }
    }

    debug!(
        project = %name,
        deps = ?project.dependencies,
        scripts = project.scripts.len(),
        "loaded project"
    );

    Ok(project)
}
