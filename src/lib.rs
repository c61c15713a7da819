// src/lib.rs

pub mod cache;
pub mod change;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;
pub mod workspace;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::BuildCacheConfiguration;
use crate::change::{ChangeAnalyzer, FileStateStore, ProjectChangeAnalyzer};
use crate::cli::CliArgs;
use crate::config::loader::{config_root_dir, load_and_validate};
use crate::dag::{OperationGraph, Scheduler, Selection};
use crate::engine::{CoreRuntime, ExecutionReport, Runtime, RuntimeEvent};
use crate::exec::{OperationRunnerFactory, RealExecutorBackend};
use crate::workspace::Workspace;

/// Knobs for executing an operation graph.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub parallelism: usize,
    /// Time between terminate signal and forced kill on cancellation.
    pub grace_period: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            grace_period: Duration::from_millis(5_000),
        }
    }
}

/// Number of hardware threads, or 1 if unknown.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and workspace discovery
/// - change analysis and build cache
/// - runner factory and operation graph
/// - scheduler / runtime / executor
/// - Ctrl-C handling
///
/// Returns `None` for `--dry-run`.
pub async fn run(args: CliArgs) -> Result<Option<ExecutionReport>> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root = config_root_dir(&config_path);

    let workspace = Workspace::from_config(&root, &cfg, &args.params)?;
    let allow_incremental = workspace.settings.allow_incremental && !args.no_incremental;

    let factory = build_factory(&workspace, allow_incremental)?;
    let selection = Selection::resolve(&workspace, &args.phases, &args.to)?;
    let graph = OperationGraph::build(&workspace, &factory, &selection)?;

    if args.dry_run {
        print_dry_run(&graph);
        return Ok(None);
    }

    let options = RunOptions {
        parallelism: args
            .parallelism
            .map(usize::from)
            .or(workspace.settings.parallelism)
            .unwrap_or_else(default_parallelism),
        grace_period: Duration::from_millis(workspace.settings.grace_period_ms),
    };

    let (runtime, rt_tx) = build_runtime(graph, options);

    // Ctrl-C → cancel the run.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling run");
            let _ = tx.send(RuntimeEvent::CancelRequested).await;
        });
    }

    let report = runtime.run().await?;
    Ok(Some(report))
}

/// Factory wired to the workspace's change analyzer and build cache.
pub fn build_factory(workspace: &Workspace, allow_incremental: bool) -> Result<OperationRunnerFactory> {
    let state = Arc::new(FileStateStore::new(workspace.root.clone()));
    let analyzer: Arc<dyn ChangeAnalyzer> = Arc::new(
        ProjectChangeAnalyzer::new(
            workspace.projects.clone(),
            &workspace.settings.fingerprint_exclude,
            state,
        )
        .context("building change analyzer")?,
    );

    let build_cache = workspace
        .settings
        .build_cache
        .as_ref()
        .map(|section| Arc::new(BuildCacheConfiguration::from_settings(&workspace.root, section)));
    if build_cache.is_none() {
        debug!("no build cache configured");
    }

    Ok(OperationRunnerFactory::new(
        Arc::clone(&workspace.parameters),
        build_cache,
        analyzer,
        allow_incremental,
    ))
}

/// Runtime that executes `graph` with real processes.
///
/// The returned sender accepts `RuntimeEvent::CancelRequested`.
pub fn build_runtime(
    graph: OperationGraph,
    options: RunOptions,
) -> (Runtime<RealExecutorBackend>, mpsc::Sender<RuntimeEvent>) {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = RealExecutorBackend::new(rt_tx.clone(), options.grace_period);
    let core = CoreRuntime::new(Scheduler::new(graph, options.parallelism));
    (Runtime::new(core, rt_rx, executor), rt_tx)
}

/// Execute `graph` to completion with real processes.
pub async fn execute_graph(graph: OperationGraph, options: RunOptions) -> Result<ExecutionReport> {
    let (runtime, _rt_tx) = build_runtime(graph, options);
    Ok(runtime.run().await?)
}

/// Print every operation, its dependencies and resolved command.
fn print_dry_run(graph: &OperationGraph) {
    println!("phasegraph dry-run");
    println!("operations ({}):", graph.len());
    for op in graph.operations() {
        println!("  - {}", op.display_name);
        match op.runner.command_line() {
            Some(cmd) => println!("      cmd: {cmd}"),
            None => println!("      cmd: (none)"),
        }
        if !op.dependencies.is_empty() {
            let deps: Vec<String> = op.dependencies.iter().map(|k| k.to_string()).collect();
            println!("      after: {deps:?}");
        }
    }

    debug!("dry-run complete (no execution)");
}
