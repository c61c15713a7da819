// tests/operation_graph.rs

use std::collections::BTreeSet;

use phasegraph_test_utils::builders::{PhaseBuilder, ProjectBuilder, WorkspaceBuilder, factory_for, graph_for};
use phasegraph_test_utils::init_tracing;

use phasegraph::dag::{OperationGraph, OperationKey, Selection};
use phasegraph::errors::PhasegraphError;
use phasegraph::workspace::Workspace;

const LINT: &str = "_phase:lint";
const BUILD: &str = "_phase:build";
const TEST: &str = "_phase:test";

/// app -> lib -> core, each with lint/build/test.
///
/// build: self = [lint], upstream = [build]
/// test:  self = [build]
fn layered_workspace() -> Workspace {
    let mut builder = WorkspaceBuilder::new()
        .with_phase(PhaseBuilder::declared(LINT).build())
        .with_phase(PhaseBuilder::declared(BUILD).after_self(LINT).after_upstream(BUILD).build())
        .with_phase(PhaseBuilder::declared(TEST).after_self(BUILD).build());

    for (name, dep) in [("app", Some("lib")), ("lib", Some("core")), ("core", None)] {
        let mut project = ProjectBuilder::new(name)
            .script(LINT, "eslint .")
            .script(BUILD, "tsc")
            .script(TEST, "jest");
        if let Some(dep) = dep {
            project = project.depends_on(dep);
        }
        builder = builder.with_project(project.build());
    }
    builder.build()
}

fn key(phase: &str, project: &str) -> OperationKey {
    OperationKey::new(phase, project)
}

fn deps_of(graph: &OperationGraph, k: &OperationKey) -> BTreeSet<OperationKey> {
    graph.get(k).expect("operation exists").dependencies.clone()
}

#[test]
fn edges_follow_self_and_upstream_dependencies() {
    init_tracing();

    let ws = layered_workspace();
    let graph = graph_for(&ws);

    assert_eq!(graph.len(), 9);

    assert_eq!(
        deps_of(&graph, &key(BUILD, "app")),
        BTreeSet::from([key(LINT, "app"), key(BUILD, "lib")])
    );
    assert_eq!(deps_of(&graph, &key(BUILD, "core")), BTreeSet::from([key(LINT, "core")]));
    assert_eq!(deps_of(&graph, &key(TEST, "lib")), BTreeSet::from([key(BUILD, "lib")]));
    assert!(deps_of(&graph, &key(LINT, "app")).is_empty());

    let core_build = graph.get(&key(BUILD, "core")).unwrap();
    assert!(core_build.dependents.contains(&key(BUILD, "lib")));
    assert!(core_build.dependents.contains(&key(TEST, "core")));
}

#[test]
fn critical_path_counts_longest_dependent_chain() {
    init_tracing();

    let ws = layered_workspace();
    let graph = graph_for(&ws);

    // core lint -> core build -> lib build -> app build -> app test
    assert_eq!(graph.get(&key(LINT, "core")).unwrap().critical_path, 5);
    assert_eq!(graph.get(&key(BUILD, "app")).unwrap().critical_path, 2);
    assert_eq!(graph.get(&key(TEST, "app")).unwrap().critical_path, 1);
}

#[test]
fn display_names_come_from_the_phase_label() {
    let ws = layered_workspace();
    let graph = graph_for(&ws);
    assert_eq!(graph.get(&key(BUILD, "lib")).unwrap().display_name, "lib (build)");
    assert_eq!(key(BUILD, "lib").to_string(), "lib#_phase:build");
}

#[test]
fn selecting_a_phase_pulls_in_its_prerequisites() {
    init_tracing();

    let ws = layered_workspace();
    let selection = Selection::resolve(&ws, &[BUILD.to_string()], &[]).unwrap();

    assert_eq!(
        selection.phases,
        BTreeSet::from([LINT.to_string(), BUILD.to_string()])
    );
    assert_eq!(selection.projects.len(), 3);

    let graph = OperationGraph::build(&ws, &factory_for(&ws), &selection).unwrap();
    assert_eq!(graph.len(), 6);
    assert!(graph.get(&key(TEST, "app")).is_none());
}

#[test]
fn to_selection_includes_transitive_dependencies_only() {
    init_tracing();

    let ws = layered_workspace();
    let selection = Selection::resolve(&ws, &[], &["lib".to_string()]).unwrap();
    assert_eq!(
        selection.projects,
        BTreeSet::from(["lib".to_string(), "core".to_string()])
    );

    let graph = OperationGraph::build(&ws, &factory_for(&ws), &selection).unwrap();
    assert_eq!(graph.len(), 6);
    assert!(graph.keys().all(|k| k.project != "app"));
}

#[test]
fn unknown_selection_names_are_errors() {
    let ws = layered_workspace();

    assert!(matches!(
        Selection::resolve(&ws, &["_phase:deploy".to_string()], &[]),
        Err(PhasegraphError::UnknownPhase(_))
    ));
    assert!(matches!(
        Selection::resolve(&ws, &[], &["nope".to_string()]),
        Err(PhasegraphError::UnknownProject(_))
    ));
}

#[test]
fn only_declared_phases_are_selected_by_default() {
    let ws = WorkspaceBuilder::new()
        .with_phase(PhaseBuilder::declared(BUILD).build())
        .with_phase(PhaseBuilder::synthetic("rebuild").build())
        .with_project(ProjectBuilder::new("a").script(BUILD, "tsc").build())
        .build();

    let selection = Selection::resolve(&ws, &[], &[]).unwrap();
    assert_eq!(selection.phases, BTreeSet::from([BUILD.to_string()]));
}

#[test]
fn cyclic_project_dependencies_are_reported_before_execution() {
    init_tracing();

    let ws = WorkspaceBuilder::new()
        .with_phase(PhaseBuilder::declared(BUILD).after_upstream(BUILD).build())
        .with_project(ProjectBuilder::new("a").depends_on("b").script(BUILD, "tsc").build())
        .with_project(ProjectBuilder::new("b").depends_on("c").script(BUILD, "tsc").build())
        .with_project(ProjectBuilder::new("c").depends_on("a").script(BUILD, "tsc").build())
        .with_project(ProjectBuilder::new("d").script(BUILD, "tsc").build())
        .build();

    let selection = Selection::resolve(&ws, &[], &[]).unwrap();
    let err = OperationGraph::build(&ws, &factory_for(&ws), &selection).unwrap_err();

    match err {
        PhasegraphError::DependencyCycle(ref msg) => {
            assert!(msg.contains("a (build)"), "{msg}");
            assert!(msg.contains("b (build)"), "{msg}");
            assert!(msg.contains("c (build)"), "{msg}");
            assert!(!msg.contains("d (build)"), "{msg}");
        }
        ref other => panic!("expected DependencyCycle, got {other:?}"),
    }
    assert!(err.is_configuration_error());
}

#[test]
fn missing_script_aborts_graph_build() {
    let ws = WorkspaceBuilder::new()
        .with_phase(PhaseBuilder::declared(BUILD).build())
        .with_project(ProjectBuilder::new("a").script(BUILD, "tsc").build())
        .with_project(ProjectBuilder::new("b").build())
        .build();

    let selection = Selection::resolve(&ws, &[], &[]).unwrap();
    let err = OperationGraph::build(&ws, &factory_for(&ws), &selection).unwrap_err();
    assert!(matches!(err, PhasegraphError::MissingScript { ref project, .. } if project == "b"));
}

#[test]
fn dependencies_outside_the_graph_are_dropped() {
    let ws = layered_workspace();
    let mut graph = graph_for(&ws);

    assert!(!graph.add_dependency(&key(BUILD, "app"), &key("_phase:deploy", "app")));
    assert!(graph.add_dependency(&key(TEST, "app"), &key(TEST, "core")));
    graph.validate().unwrap();
}
