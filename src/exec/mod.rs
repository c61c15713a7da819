// src/exec/mod.rs

//! Execution layer.
//!
//! - [`factory`] decides, per (phase, project), which runner to build and
//!   resolves its command line.
//! - [`runner`] holds the closed set of runners and their result type.
//! - [`shell`] runs a command line, consulting the change analyzer and the
//!   build cache first.
//! - [`noop`] reports a preset status without doing anything.
//! - [`process`] spawns the child process and handles termination.
//! - [`backend`] provides the `ExecutorBackend` trait and a concrete
//!   `RealExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod factory;
pub mod noop;
pub mod process;
pub mod runner;
pub mod shell;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use factory::{convert_slashes_for_windows, OperationRunnerFactory};
pub use noop::NoOpOperationRunner;
pub use process::{run_shell_command, ProcessOutcome};
pub use runner::{OperationResult, OperationRunner, RunnerContext};
pub use shell::ShellOperationRunner;
