// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::operation::{OperationKey, ScheduledOperation};

/// Structured result of a single scheduler "step".
///
/// This is useful for tests that want to manually step the graph and make
/// assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Operations that must be executed now. They are already `Executing`.
    pub newly_scheduled: Vec<ScheduledOperation>,
    /// Operations whose runner reported a preset status without executing.
    pub newly_settled: Vec<OperationKey>,
    /// Operations newly marked `Blocked` by an upstream failure.
    pub newly_blocked: Vec<OperationKey>,
    /// Operations newly marked `Aborted` by cancellation.
    pub newly_aborted: Vec<OperationKey>,
    /// Whether this step left every operation terminal.
    pub run_just_finished: bool,
}
