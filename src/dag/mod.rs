// src/dag/mod.rs

//! Operation graph and scheduling.
//!
//! - [`operation`] defines the graph node and its key.
//! - [`graph`] builds the (phase, project) graph and rejects cycles.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   operations run, and when dependents are released or blocked.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] applies status transitions and propagates them.

pub mod graph;
pub mod operation;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;

pub use graph::{OperationGraph, Selection};
pub use operation::{Operation, OperationKey, ScheduledOperation};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use state_manager::DependencyState;
