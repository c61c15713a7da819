#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use phasegraph::change::{ChangeAnalyzer, MemoryStateStore, ProjectChangeAnalyzer};
use phasegraph::config::SettingsSection;
use phasegraph::dag::{OperationGraph, Selection};
use phasegraph::exec::OperationRunnerFactory;
use phasegraph::types::ExecutionTarget;
use phasegraph::workspace::{CustomParameter, ParameterSet, Phase, Project, Workspace};

/// Builder for `Workspace` to simplify test setup.
pub struct WorkspaceBuilder {
    root: PathBuf,
    settings: SettingsSection,
    phases: Vec<Phase>,
    projects: Vec<Project>,
    parameters: ParameterSet,
}

impl WorkspaceBuilder {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("."),
            settings: SettingsSection::default(),
            phases: Vec::new(),
            projects: Vec::new(),
            parameters: ParameterSet::new(),
        }
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phases.push(phase);
        self
    }

    pub fn with_project(mut self, project: Project) -> Self {
        self.projects.push(project);
        self
    }

    pub fn with_parameter(mut self, parameter: CustomParameter) -> Self {
        self.parameters.insert(parameter);
        self
    }

    pub fn with_settings(mut self, settings: SettingsSection) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Workspace {
        Workspace::new(self.root, self.settings, self.phases, self.projects, self.parameters)
    }
}

impl Default for WorkspaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `Phase`.
pub struct PhaseBuilder {
    phase: Phase,
}

impl PhaseBuilder {
    /// A declared phase, e.g. `_phase:build`.
    pub fn declared(name: &str) -> Self {
        Self {
            phase: Phase::declared(name),
        }
    }

    pub fn synthetic(name: &str) -> Self {
        Self {
            phase: Phase::synthetic(name),
        }
    }

    pub fn after_self(mut self, phase: &str) -> Self {
        self.phase.self_dependencies.push(phase.to_string());
        self
    }

    pub fn after_upstream(mut self, phase: &str) -> Self {
        self.phase.upstream_dependencies.push(phase.to_string());
        self
    }

    pub fn ignore_missing_script(mut self, val: bool) -> Self {
        self.phase.ignore_missing_script = val;
        self
    }

    pub fn parameter(mut self, long_name: &str) -> Self {
        self.phase.associated_parameters.push(long_name.to_string());
        self
    }

    pub fn build(self) -> Phase {
        self.phase
    }
}

/// Builder for `Project`.
pub struct ProjectBuilder {
    project: Project,
}

impl ProjectBuilder {
    /// Projects default to a folder named after them; tests that spawn
    /// processes should set a real one.
    pub fn new(name: &str) -> Self {
        Self {
            project: Project::new(name, name),
        }
    }

    pub fn folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.project.folder = folder.into();
        self
    }

    pub fn depends_on(mut self, project: &str) -> Self {
        self.project.dependencies.insert(project.to_string());
        self
    }

    pub fn script(mut self, phase: &str, command: &str) -> Self {
        self.project
            .scripts
            .insert(phase.to_string(), Some(command.to_string()));
        self
    }

    pub fn null_script(mut self, phase: &str) -> Self {
        self.project.scripts.insert(phase.to_string(), None);
        self
    }

    pub fn build(self) -> Project {
        self.project
    }
}

/// Change analyzer over the workspace's projects that never touches disk
/// state.
pub fn memory_change_analyzer(workspace: &Workspace) -> Arc<dyn ChangeAnalyzer> {
    Arc::new(
        ProjectChangeAnalyzer::new(
            workspace.projects.clone(),
            &[],
            Arc::new(MemoryStateStore::new()),
        )
        .expect("empty exclude set is valid"),
    )
}

/// Factory without build cache, targeting POSIX shells.
pub fn factory_for(workspace: &Workspace) -> OperationRunnerFactory {
    OperationRunnerFactory::new(
        Arc::clone(&workspace.parameters),
        None,
        memory_change_analyzer(workspace),
        false,
    )
    .with_target(ExecutionTarget::Posix)
}

/// Graph over every phase and project of `workspace`.
pub fn graph_for(workspace: &Workspace) -> OperationGraph {
    let factory = factory_for(workspace);
    let phases: Vec<String> = workspace.phases.keys().cloned().collect();
    let selection = Selection::resolve(workspace, &phases, &[]).expect("valid selection");
    OperationGraph::build(workspace, &factory, &selection).expect("valid graph")
}
