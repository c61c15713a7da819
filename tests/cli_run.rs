// tests/cli_run.rs

use std::path::PathBuf;

use clap::Parser;

use phasegraph::cli::CliArgs;
use phasegraph::dag::OperationKey;
use phasegraph::run;
use phasegraph::types::OperationStatus;
use phasegraph_test_utils::{init_tracing, with_timeout};

fn demo_config() -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos/basic/phasegraph.toml")
        .to_string_lossy()
        .into_owned()
}

fn parse(extra: &[&str]) -> CliArgs {
    let config = demo_config();
    let mut argv = vec!["phasegraph", "--config", config.as_str()];
    argv.extend_from_slice(extra);
    CliArgs::try_parse_from(argv).unwrap()
}

#[test]
fn cli_collects_repeatable_options() {
    let args = parse(&[
        "--phase",
        "_phase:build",
        "--to",
        "alpha",
        "--to",
        "gamma",
        "--param",
        "--locale=fr",
        "--param",
        "production",
        "--parallelism",
        "3",
    ]);

    assert_eq!(args.phases, vec!["_phase:build"]);
    assert_eq!(args.to, vec!["alpha", "gamma"]);
    assert_eq!(args.parallelism, Some(3));
    assert_eq!(args.params.len(), 2);
    assert!(!args.dry_run);
    assert!(!args.no_incremental);
}

#[test]
fn cli_rejects_zero_parallelism() {
    let result = CliArgs::try_parse_from(["phasegraph", "--parallelism", "0"]);
    assert!(result.is_err());
}

#[tokio::test]
async fn dry_run_builds_the_graph_without_executing() {
    init_tracing();

    let report = run(parse(&["--dry-run"])).await.unwrap();
    assert!(report.is_none());
}

#[tokio::test]
async fn unknown_project_is_an_error() {
    init_tracing();

    let err = run(parse(&["--to", "delta", "--dry-run"])).await.unwrap_err();
    assert!(format!("{err:#}").contains("delta"), "{err:#}");
}

#[cfg(unix)]
#[tokio::test]
async fn demo_workspace_runs_to_completion() {
    init_tracing();

    let report = with_timeout(run(parse(&["--no-incremental", "--param", "--locale=fr"])))
        .await
        .unwrap()
        .expect("not a dry run");

    assert!(report.is_success(), "{}", report.render_summary());

    let alpha = report
        .record(&OperationKey::new("_phase:build", "alpha"))
        .unwrap();
    assert_eq!(alpha.status, OperationStatus::Success);
    assert_eq!(alpha.output.trim(), "build alpha --locale fr");

    // Empty and null lint scripts never spawn a process.
    assert_eq!(
        report.status_of(&OperationKey::new("_phase:lint", "beta")),
        Some(OperationStatus::FromCache)
    );
    assert_eq!(
        report.status_of(&OperationKey::new("_phase:lint", "gamma")),
        Some(OperationStatus::FromCache)
    );
}
