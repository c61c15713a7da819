// src/change/analyzer.rs

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use globset::GlobSet;
use tracing::debug;

use crate::change::hash::{build_exclude_set, compute_aggregate_hash, compute_tree_hash};
use crate::change::state::{StateStore, state_key};
use crate::change::Fingerprint;
use crate::workspace::Project;

/// Decides whether an operation's inputs changed since its last success.
pub trait ChangeAnalyzer: Send + Sync + fmt::Debug {
    /// Fingerprint of everything that influences `(project, phase)` when run
    /// with `command_line`.
    fn fingerprint(&self, project: &Project, phase: &str, command_line: &str) -> Result<Fingerprint>;

    /// Whether the last recorded success of `(project, phase)` had exactly
    /// this fingerprint.
    fn is_project_unchanged(&self, project: &Project, phase: &str, fingerprint: &Fingerprint) -> Result<bool>;

    /// Remember `fingerprint` as the last successful state of `(project, phase)`.
    fn record_success(&self, project: &Project, phase: &str, fingerprint: &Fingerprint) -> Result<()>;
}

/// Fingerprints projects by hashing their folder contents and the contents
/// of every project they transitively depend on.
pub struct ProjectChangeAnalyzer {
    projects: BTreeMap<String, Arc<Project>>,
    excludes: GlobSet,
    state: Arc<dyn StateStore>,
}

impl fmt::Debug for ProjectChangeAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectChangeAnalyzer")
            .field("projects", &self.projects.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ProjectChangeAnalyzer {
    pub fn new(
        projects: BTreeMap<String, Arc<Project>>,
        exclude_patterns: &[String],
        state: Arc<dyn StateStore>,
    ) -> Result<Self> {
        Ok(Self {
            projects,
            excludes: build_exclude_set(exclude_patterns)?,
            state,
        })
    }

    fn transitive_dependencies(&self, project: &Project) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = project.dependencies.iter().map(|s| s.as_str()).collect();
        while let Some(name) = stack.pop() {
            if name == project.name || !seen.insert(name.to_string()) {
                continue;
            }
            if let Some(dep) = self.projects.get(name) {
                stack.extend(dep.dependencies.iter().map(|s| s.as_str()));
            }
        }
        seen
    }
}

impl ChangeAnalyzer for ProjectChangeAnalyzer {
    fn fingerprint(&self, project: &Project, phase: &str, command_line: &str) -> Result<Fingerprint> {
        let mut parts = vec![
            phase.to_string(),
            command_line.to_string(),
            project.name.clone(),
            compute_tree_hash(&project.folder, &self.excludes)?,
        ];

        for dep_name in self.transitive_dependencies(project) {
            if let Some(dep) = self.projects.get(&dep_name) {
                parts.push(dep_name);
                parts.push(compute_tree_hash(&dep.folder, &self.excludes)?);
            }
        }

        let fingerprint = Fingerprint::new(compute_aggregate_hash(&parts));
        debug!(project = %project.name, phase = %phase, %fingerprint, "computed fingerprint");
        Ok(fingerprint)
    }

    fn is_project_unchanged(&self, project: &Project, phase: &str, fingerprint: &Fingerprint) -> Result<bool> {
        let stored = self.state.load(&state_key(&project.name, phase))?;
        Ok(stored.as_deref() == Some(fingerprint.as_str()))
    }

    fn record_success(&self, project: &Project, phase: &str, fingerprint: &Fingerprint) -> Result<()> {
        self.state
            .save(&state_key(&project.name, phase), fingerprint.as_str())
    }
}
