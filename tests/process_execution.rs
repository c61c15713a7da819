// tests/process_execution.rs
#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::tempdir;
use tokio::sync::watch;
use tokio::time::timeout;

use phasegraph::dag::OperationKey;
use phasegraph::engine::RuntimeEvent;
use phasegraph::exec::run_shell_command;
use phasegraph::types::OperationStatus;
use phasegraph::workspace::Workspace;
use phasegraph::{RunOptions, build_runtime, execute_graph};
use phasegraph_test_utils::builders::{PhaseBuilder, ProjectBuilder, WorkspaceBuilder, graph_for};
use phasegraph_test_utils::{assert_stays_absent, init_tracing, with_timeout};

const BUILD: &str = "_phase:build";

fn key(project: &str) -> OperationKey {
    OperationKey::new(BUILD, project)
}

fn options(parallelism: usize) -> RunOptions {
    RunOptions {
        parallelism,
        grace_period: Duration::from_millis(200),
    }
}

/// Workspace under `root` with one folder per project; `projects` is
/// (name, dependency, build script).
fn shell_workspace(root: &Path, projects: &[(&str, Option<&str>, &str)]) -> Workspace {
    let mut builder = WorkspaceBuilder::new()
        .root(root)
        .with_phase(PhaseBuilder::declared(BUILD).after_upstream(BUILD).build());
    for (name, dep, script) in projects {
        let folder = root.join(name);
        fs::create_dir_all(&folder).unwrap();
        let mut project = ProjectBuilder::new(name).folder(folder).script(BUILD, script);
        if let Some(dep) = dep {
            project = project.depends_on(dep);
        }
        builder = builder.with_project(project.build());
    }
    builder.build()
}

#[tokio::test]
async fn shell_command_output_and_exit_code_are_captured() {
    init_tracing();

    let dir = tempdir().unwrap();
    let (_cancel_tx, mut cancel) = watch::channel(false);

    let outcome = run_shell_command(
        "echo",
        "echo hello && echo oops 1>&2",
        dir.path(),
        &mut cancel,
        Duration::from_millis(200),
    )
    .await
    .unwrap();

    assert!(outcome.success);
    assert!(!outcome.cancelled);
    assert_eq!(outcome.exit_code, Some(0));
    assert!(outcome.output.contains("hello"), "{}", outcome.output);
    assert!(outcome.output.contains("oops"), "{}", outcome.output);

    let outcome = run_shell_command("exit", "exit 3", dir.path(), &mut cancel, Duration::from_millis(200))
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, Some(3));
}

#[tokio::test]
async fn operations_run_in_their_project_folder() {
    init_tracing();

    let dir = tempdir().unwrap();
    let ws = shell_workspace(dir.path(), &[("app", None, "pwd")]);

    let report = with_timeout(execute_graph(graph_for(&ws), options(1)))
        .await
        .unwrap();

    let record = report.record(&key("app")).unwrap();
    assert_eq!(record.status, OperationStatus::Success);
    assert_eq!(record.exit_code, Some(0));
    let printed = Path::new(record.output.trim()).canonicalize().unwrap();
    assert_eq!(printed, dir.path().join("app").canonicalize().unwrap());
}

#[tokio::test]
async fn non_zero_exit_fails_and_blocks_dependents() {
    init_tracing();

    let dir = tempdir().unwrap();
    let ws = shell_workspace(
        dir.path(),
        &[
            ("lib", None, "echo broken; exit 3"),
            ("app", Some("lib"), "touch built.marker"),
            ("tool", None, "echo fine"),
        ],
    );

    let report = with_timeout(execute_graph(graph_for(&ws), options(2)))
        .await
        .unwrap();

    let lib = report.record(&key("lib")).unwrap();
    assert_eq!(lib.status, OperationStatus::Failure);
    assert_eq!(lib.exit_code, Some(3));
    assert!(lib.output.contains("broken"));

    assert_eq!(report.status_of(&key("app")), Some(OperationStatus::Blocked));
    assert!(!dir.path().join("app/built.marker").exists());

    assert_eq!(report.status_of(&key("tool")), Some(OperationStatus::Success));
    assert!(!report.is_success());

    let summary = report.render_summary();
    assert!(summary.contains("FAILURE lib (build) (exit code 3"), "{summary}");
    assert!(summary.contains("\n  broken"), "{summary}");
}

#[tokio::test]
async fn dependencies_finish_before_dependents_start() {
    init_tracing();

    let dir = tempdir().unwrap();
    let log = dir.path().join("order.log");
    let append = |name: &str| format!("sleep 0.1; echo {name} >> {}", log.display());
    let (core, lib, app) = (append("core"), append("lib"), append("app"));
    let ws = shell_workspace(
        dir.path(),
        &[
            ("core", None, core.as_str()),
            ("lib", Some("core"), lib.as_str()),
            ("app", Some("lib"), app.as_str()),
        ],
    );

    let report = with_timeout(execute_graph(graph_for(&ws), options(4)))
        .await
        .unwrap();
    assert!(report.is_success());

    let order = fs::read_to_string(&log).unwrap();
    assert_eq!(order.lines().collect::<Vec<_>>(), vec!["core", "lib", "app"]);
}

#[tokio::test]
async fn cancellation_terminates_running_process_and_aborts_the_rest() {
    init_tracing();

    let dir = tempdir().unwrap();
    let ws = shell_workspace(
        dir.path(),
        &[
            ("slow", None, "sleep 30"),
            ("after", Some("slow"), "touch built.marker"),
        ],
    );

    let (runtime, rt_tx) = build_runtime(graph_for(&ws), options(2));
    let handle = tokio::spawn(runtime.run());

    tokio::time::sleep(Duration::from_millis(300)).await;
    rt_tx.send(RuntimeEvent::CancelRequested).await.unwrap();

    let report = timeout(Duration::from_secs(5), handle)
        .await
        .expect("cancelled run should finish well before the command would")
        .unwrap()
        .unwrap();

    assert_eq!(report.status_of(&key("slow")), Some(OperationStatus::Aborted));
    assert_eq!(report.status_of(&key("after")), Some(OperationStatus::Aborted));
    assert!(!dir.path().join("after/built.marker").exists());
    assert!(report.render_summary().contains("ABORTED"));
}

#[tokio::test]
async fn process_ignoring_terminate_is_killed_after_grace_period() {
    init_tracing();

    let dir = tempdir().unwrap();
    let (cancel_tx, mut cancel) = watch::channel(false);

    let run = tokio::spawn({
        let cwd = dir.path().to_path_buf();
        async move {
            run_shell_command(
                "stubborn",
                "trap '' TERM; while true; do sleep 0.05; done",
                &cwd,
                &mut cancel,
                Duration::from_millis(200),
            )
            .await
        }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel_tx.send_replace(true);

    let outcome = timeout(Duration::from_secs(5), run)
        .await
        .expect("killed process should be reaped")
        .unwrap()
        .unwrap();
    assert!(outcome.cancelled);
    assert!(!outcome.success);
}

#[tokio::test]
async fn cancellation_stops_processes_started_by_the_script() {
    init_tracing();

    let dir = tempdir().unwrap();
    let (cancel_tx, mut cancel) = watch::channel(false);

    let run = tokio::spawn({
        let cwd = dir.path().to_path_buf();
        async move {
            run_shell_command(
                "nested",
                "sh -c 'sleep 1 && touch late.marker'; echo after",
                &cwd,
                &mut cancel,
                Duration::from_millis(200),
            )
            .await
        }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel_tx.send_replace(true);

    let outcome = with_timeout(run).await.unwrap().unwrap();
    assert!(outcome.cancelled);
    assert!(!outcome.output.contains("after"), "{}", outcome.output);

    // Long enough for the inner `sleep 1` to have finished had it survived.
    assert_stays_absent(&dir.path().join("late.marker"), Duration::from_millis(1800)).await;
}

#[tokio::test]
async fn leftover_processes_ignoring_terminate_are_killed_after_grace_period() {
    init_tracing();

    let dir = tempdir().unwrap();
    let (cancel_tx, mut cancel) = watch::channel(false);

    // The outer shell exits on SIGTERM; the background job ignores it.
    let run = tokio::spawn({
        let cwd = dir.path().to_path_buf();
        async move {
            run_shell_command(
                "background",
                "sh -c \"trap '' TERM; sleep 1; touch stubborn.marker\" & wait",
                &cwd,
                &mut cancel,
                Duration::from_millis(200),
            )
            .await
        }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel_tx.send_replace(true);

    let outcome = with_timeout(run).await.unwrap().unwrap();
    assert!(outcome.cancelled);

    assert_stays_absent(&dir.path().join("stubborn.marker"), Duration::from_millis(1800)).await;
}

#[tokio::test]
async fn spawn_failure_fails_only_that_operation() {
    init_tracing();

    let dir = tempdir().unwrap();
    let ws = shell_workspace(
        dir.path(),
        &[
            ("gone", None, "echo unreachable"),
            ("needs-gone", Some("gone"), "touch built.marker"),
            ("ok", None, "echo fine"),
        ],
    );
    fs::remove_dir_all(dir.path().join("gone")).unwrap();

    let report = with_timeout(execute_graph(graph_for(&ws), options(2)))
        .await
        .unwrap();

    let gone = report.record(&key("gone")).unwrap();
    assert_eq!(gone.status, OperationStatus::Failure);
    assert_eq!(gone.exit_code, None);
    let error = gone.error.as_deref().unwrap_or_default();
    assert!(error.contains("spawning process for 'gone (build)'"), "{error}");

    assert_eq!(report.status_of(&key("needs-gone")), Some(OperationStatus::Blocked));
    assert!(!dir.path().join("needs-gone/built.marker").exists());

    let ok = report.record(&key("ok")).unwrap();
    assert_eq!(ok.status, OperationStatus::Success);
    assert_eq!(ok.output, "fine");
    assert!(!report.is_success());
}
