// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, info};

use crate::dag::operation::{Operation, OperationKey};
use crate::errors::{PhasegraphError, Result};
use crate::exec::OperationRunnerFactory;
use crate::workspace::Workspace;

/// Which phases and projects take part in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub phases: BTreeSet<String>,
    pub projects: BTreeSet<String>,
}

impl Selection {
    /// Resolve the command-line selection against the workspace.
    ///
    /// - No phases requested: every declared phase, or every phase when the
    ///   workspace only has synthetic ones.
    /// - Requested phases are closed over their `self` and `upstream`
    ///   dependencies, so prerequisites always run.
    /// - No projects requested: every project. Otherwise the requested
    ///   projects plus everything they transitively depend on.
    pub fn resolve(workspace: &Workspace, phases: &[String], to_projects: &[String]) -> Result<Self> {
        let mut selected_phases = BTreeSet::new();
        let mut stack: Vec<String> = if phases.is_empty() {
            let declared: Vec<String> = workspace
                .phases
                .values()
                .filter(|p| !p.is_synthetic())
                .map(|p| p.name.clone())
                .collect();
            if declared.is_empty() {
                workspace.phases.keys().cloned().collect()
            } else {
                declared
            }
        } else {
            phases.to_vec()
        };
        while let Some(name) = stack.pop() {
            let phase = workspace.phase(&name)?;
            if !selected_phases.insert(name) {
                continue;
            }
            stack.extend(phase.self_dependencies.iter().cloned());
            stack.extend(phase.upstream_dependencies.iter().cloned());
        }

        let projects = if to_projects.is_empty() {
            workspace.projects.keys().cloned().collect()
        } else {
            workspace.with_transitive_dependencies(to_projects.iter().map(|s| s.as_str()))?
        };

        Ok(Self {
            phases: selected_phases,
            projects,
        })
    }
}

/// Directed acyclic graph of operations keyed by (phase, project).
#[derive(Debug, Default)]
pub struct OperationGraph {
    nodes: BTreeMap<OperationKey, Operation>,
}

impl OperationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create one operation per selected (phase, project), wire their
    /// dependencies and validate the result.
    ///
    /// For phase P of project X the dependencies are:
    /// - `(D, X)` for each D in `P.self_dependencies`
    /// - `(U, Y)` for each U in `P.upstream_dependencies` and each project Y
    ///   that X depends on directly
    ///
    /// Any factory error (a missing script) aborts the build before anything
    /// runs.
    pub fn build(workspace: &Workspace, factory: &OperationRunnerFactory, selection: &Selection) -> Result<Self> {
        let mut graph = OperationGraph::new();

        for phase_name in selection.phases.iter() {
            let phase = workspace.phase(phase_name)?;
            for project_name in selection.projects.iter() {
                let project = workspace.project(project_name)?;
                let runner = factory.create_operation_runner(phase, project)?;
                graph.add_operation(Operation::new(
                    OperationKey::new(phase_name, project_name),
                    runner,
                ))?;
            }
        }

        let keys: Vec<OperationKey> = graph.nodes.keys().cloned().collect();
        for key in keys.iter() {
            let phase = workspace.phase(&key.phase)?;
            let project = workspace.project(&key.project)?;

            for dep_phase in phase.self_dependencies.iter() {
                graph.add_dependency(key, &OperationKey::new(dep_phase, &key.project));
            }
            for dep_phase in phase.upstream_dependencies.iter() {
                for dep_project in project.dependencies.iter() {
                    graph.add_dependency(key, &OperationKey::new(dep_phase, dep_project));
                }
            }
        }

        graph.validate()?;

        info!(
            operations = graph.len(),
            phases = selection.phases.len(),
            projects = selection.projects.len(),
            "built operation graph"
        );
        Ok(graph)
    }

    pub fn add_operation(&mut self, op: Operation) -> Result<()> {
        if self.nodes.contains_key(&op.key) {
            return Err(PhasegraphError::ConfigError(format!(
                "duplicate operation '{}'",
                op.key
            )));
        }
        self.nodes.insert(op.key.clone(), op);
        Ok(())
    }

    /// Record that `operation` depends on `depends_on`.
    ///
    /// Returns `false` (and records nothing) if either side is not part of
    /// the graph.
    pub fn add_dependency(&mut self, operation: &OperationKey, depends_on: &OperationKey) -> bool {
        if !self.nodes.contains_key(operation) || !self.nodes.contains_key(depends_on) {
            debug!(%operation, %depends_on, "dependency outside the selection; dropped");
            return false;
        }
        if let Some(op) = self.nodes.get_mut(operation) {
            op.dependencies.insert(depends_on.clone());
        }
        if let Some(dep) = self.nodes.get_mut(depends_on) {
            dep.dependents.insert(operation.clone());
        }
        true
    }

    /// Check that the graph is acyclic and compute critical path lengths.
    pub fn validate(&mut self) -> Result<()> {
        let mut graph: DiGraph<OperationKey, ()> = DiGraph::new();
        let mut index: HashMap<OperationKey, NodeIndex> = HashMap::new();

        for key in self.nodes.keys() {
            index.insert(key.clone(), graph.add_node(key.clone()));
        }
        // Edge direction: dependency -> dependent.
        for (key, op) in self.nodes.iter() {
            for dep in op.dependencies.iter() {
                if let (Some(from), Some(to)) = (index.get(dep), index.get(key)) {
                    graph.add_edge(*from, *to, ());
                }
            }
        }

        let order = match toposort(&graph, None) {
            Ok(order) => order,
            Err(cycle) => return Err(self.cycle_error(&graph, cycle.node_id())),
        };

        // Dependents come later in topological order, so walk it backwards.
        let mut lengths: HashMap<NodeIndex, usize> = HashMap::new();
        for idx in order.iter().rev() {
            let longest = graph
                .neighbors(*idx)
                .filter_map(|n| lengths.get(&n).copied())
                .max()
                .unwrap_or(0);
            lengths.insert(*idx, longest + 1);
        }
        for (key, idx) in index.iter() {
            if let Some(op) = self.nodes.get_mut(key) {
                op.critical_path = lengths.get(idx).copied().unwrap_or(1);
            }
        }

        Ok(())
    }

    fn cycle_error(&self, graph: &DiGraph<OperationKey, ()>, at: NodeIndex) -> PhasegraphError {
        let members = tarjan_scc(graph)
            .into_iter()
            .find(|scc| scc.contains(&at))
            .unwrap_or_else(|| vec![at]);

        let mut names: Vec<String> = members
            .iter()
            .map(|idx| {
                let key = &graph[*idx];
                self.nodes
                    .get(key)
                    .map(|op| op.display_name.clone())
                    .unwrap_or_else(|| key.to_string())
            })
            .collect();
        names.sort();

        PhasegraphError::DependencyCycle(format!(
            "cycle detected between operations: {}",
            names.join(", ")
        ))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, key: &OperationKey) -> Option<&Operation> {
        self.nodes.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &OperationKey> {
        self.nodes.keys()
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.nodes.values()
    }

    pub(crate) fn into_nodes(self) -> BTreeMap<OperationKey, Operation> {
        self.nodes
    }
}
