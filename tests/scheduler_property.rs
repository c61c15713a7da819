// tests/scheduler_property.rs

use std::collections::{BTreeMap, BTreeSet, HashSet};

use proptest::prelude::*;

use phasegraph::dag::{OperationKey, Scheduler};
use phasegraph::exec::OperationResult;
use phasegraph::types::OperationStatus;
use phasegraph::workspace::Workspace;
use phasegraph_test_utils::builders::{PhaseBuilder, ProjectBuilder, WorkspaceBuilder, graph_for};

const BUILD: &str = "_phase:build";

/// A random acyclic workspace plus the project-level edges used to build it.
#[derive(Debug, Clone)]
struct Case {
    workspace_edges: Vec<BTreeSet<usize>>,
    empty_scripts: BTreeSet<usize>,
}

impl Case {
    fn name(i: usize) -> String {
        format!("p{i}")
    }

    fn workspace(&self) -> Workspace {
        let mut builder =
            WorkspaceBuilder::new().with_phase(PhaseBuilder::declared(BUILD).after_upstream(BUILD).build());
        for (i, deps) in self.workspace_edges.iter().enumerate() {
            let script = if self.empty_scripts.contains(&i) { "" } else { "make" };
            let mut project = ProjectBuilder::new(&Self::name(i)).script(BUILD, script);
            for dep in deps {
                project = project.depends_on(&Self::name(*dep));
            }
            builder = builder.with_project(project.build());
        }
        builder.build()
    }
}

// Acyclicity: project i may only depend on projects 0..i.
fn case_strategy(max_projects: usize) -> impl Strategy<Value = Case> {
    (1..=max_projects).prop_flat_map(|n| {
        let deps = proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n);
        let empty = proptest::collection::vec(0..n, 0..3);
        (deps, empty).prop_map(move |(raw, empty)| {
            let workspace_edges = raw
                .into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    if i == 0 {
                        BTreeSet::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    }
                })
                .collect();
            Case {
                workspace_edges,
                empty_scripts: empty.into_iter().collect(),
            }
        })
    })
}

proptest! {
    #[test]
    fn scheduler_respects_dependencies_cap_and_blocking(
        case in case_strategy(12),
        failing in proptest::collection::vec(0..12usize, 0..4),
        parallelism in 1..4usize,
    ) {
        let failing: HashSet<OperationKey> = failing
            .into_iter()
            .map(|i| OperationKey::new(BUILD, Case::name(i)))
            .collect();

        let ws = case.workspace();
        let graph = graph_for(&ws);
        let deps: BTreeMap<OperationKey, BTreeSet<OperationKey>> = graph
            .operations()
            .map(|op| (op.key.clone(), op.dependencies.clone()))
            .collect();

        let mut scheduler = Scheduler::new(graph, parallelism);
        let mut executing: Vec<OperationKey> = Vec::new();
        let mut dispatched: HashSet<OperationKey> = HashSet::new();

        let step = scheduler.start();
        for op in step.newly_scheduled {
            executing.push(op.key);
        }

        let mut steps = 0;
        while !scheduler.is_finished() {
            steps += 1;
            prop_assert!(steps < 1000, "simulation did not terminate");
            prop_assert!(!executing.is_empty(), "scheduler stalled with non-terminal operations");
            prop_assert!(executing.len() <= parallelism);

            let k = executing.remove(0);
            // Dependencies were terminal and successful when `k` was dispatched.
            for dep in deps[&k].iter() {
                let status = scheduler.status_of(dep).unwrap();
                prop_assert!(status.is_successful(), "{} ran before {} succeeded ({})", k, dep, status);
            }
            prop_assert!(dispatched.insert(k.clone()), "{} dispatched twice", k);

            let status = if failing.contains(&k) {
                OperationStatus::Failure
            } else {
                OperationStatus::Success
            };
            let step = scheduler.handle_completion(&k, OperationResult::with_status(status));
            for op in step.newly_scheduled {
                executing.push(op.key);
            }
        }

        // Final statuses are consistent with the dependency structure.
        for (k, k_deps) in deps.iter() {
            let status = scheduler.status_of(k).unwrap();
            prop_assert!(status.is_terminal());
            let any_dep_bad = k_deps
                .iter()
                .any(|d| scheduler.status_of(d).unwrap().blocks_dependents());
            if any_dep_bad {
                prop_assert_eq!(status, OperationStatus::Blocked, "{} should be blocked", k);
                prop_assert!(!dispatched.contains(k), "blocked {} was dispatched", k);
            } else {
                prop_assert_ne!(status, OperationStatus::Blocked, "{} blocked without cause", k);
            }
        }
    }
}
