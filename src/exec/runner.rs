// src/exec/runner.rs

//! The runner behind each operation.
//!
//! The set of runners is closed: an operation either runs a shell command or
//! reports a preset status without doing any work.

use std::time::Duration;

use tokio::sync::watch;

use crate::exec::noop::NoOpOperationRunner;
use crate::exec::shell::ShellOperationRunner;
use crate::types::OperationStatus;

/// Shared execution context handed to every runner.
#[derive(Debug, Clone)]
pub struct RunnerContext {
    /// Flips to `true` when the run is cancelled.
    pub cancel: watch::Receiver<bool>,
    /// Time between terminate signal and forced kill.
    pub grace_period: Duration,
}

impl RunnerContext {
    pub fn new(cancel: watch::Receiver<bool>, grace_period: Duration) -> Self {
        Self {
            cancel,
            grace_period,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// Outcome of executing one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub status: OperationStatus,
    pub exit_code: Option<i32>,
    /// Captured (or replayed) process output.
    pub output: String,
    pub duration: Duration,
    /// Infrastructure error message, when the operation could not run at all.
    pub error: Option<String>,
}

impl OperationResult {
    pub fn with_status(status: OperationStatus) -> Self {
        Self {
            status,
            exit_code: None,
            output: String::new(),
            duration: Duration::ZERO,
            error: None,
        }
    }

    pub fn infrastructure_failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::with_status(OperationStatus::Failure)
        }
    }
}

#[derive(Debug)]
pub enum OperationRunner {
    Shell(ShellOperationRunner),
    NoOp(NoOpOperationRunner),
}

impl OperationRunner {
    pub fn display_name(&self) -> &str {
        match self {
            OperationRunner::Shell(r) => &r.display_name,
            OperationRunner::NoOp(r) => &r.display_name,
        }
    }

    /// Silent runners are left out of the final report.
    pub fn is_silent(&self) -> bool {
        match self {
            OperationRunner::Shell(_) => false,
            OperationRunner::NoOp(r) => r.silent,
        }
    }

    /// Resolved command line, for shell runners.
    pub fn command_line(&self) -> Option<&str> {
        match self {
            OperationRunner::Shell(r) => Some(&r.command_line),
            OperationRunner::NoOp(_) => None,
        }
    }

    /// Status a runner reports without executing anything, if it has one.
    pub fn preset_status(&self) -> Option<OperationStatus> {
        match self {
            OperationRunner::Shell(_) => None,
            OperationRunner::NoOp(r) => Some(r.result),
        }
    }

    pub async fn execute(&self, ctx: &RunnerContext) -> OperationResult {
        match self {
            OperationRunner::Shell(r) => r.execute(ctx).await,
            OperationRunner::NoOp(r) => r.execute(),
        }
    }
}
