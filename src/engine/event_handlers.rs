// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, info};

use crate::dag::{OperationKey, ScheduledOperation, Scheduler, SchedulerStep};
use crate::exec::OperationResult;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these operations to the executor.
    DispatchOperations(Vec<ScheduledOperation>),
    /// Signal every in-flight operation to stop.
    CancelInFlight,
    /// Every operation is terminal; the run is over.
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    /// Translate a scheduler step into shell commands.
    pub fn from_scheduler_step(step: SchedulerStep) -> Self {
        let mut commands = Vec::new();
        if !step.newly_scheduled.is_empty() {
            commands.push(CoreCommand::DispatchOperations(step.newly_scheduled));
        }
        if step.run_just_finished {
            commands.push(CoreCommand::RequestExit);
        }
        CoreStep {
            commands,
            keep_running: !step.run_just_finished,
        }
    }

    pub fn dispatched(&self) -> impl Iterator<Item = &ScheduledOperation> {
        self.commands.iter().flat_map(|c| match c {
            CoreCommand::DispatchOperations(ops) => ops.iter(),
            _ => Default::default(),
        })
    }
}

/// Seed the run: promote the roots and dispatch the first batch.
pub fn handle_start(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.start();
    if !step.newly_settled.is_empty() {
        debug!(settled = step.newly_settled.len(), "operations settled without executing");
    }
    CoreStep::from_scheduler_step(step)
}

/// Handle an operation completion event.
pub fn handle_operation_completed(
    scheduler: &mut Scheduler,
    key: OperationKey,
    result: OperationResult,
) -> CoreStep {
    let step = scheduler.handle_completion(&key, result);
    if !step.newly_blocked.is_empty() {
        let blocked: Vec<String> = step.newly_blocked.iter().map(|k| k.to_string()).collect();
        info!(operation = %key, ?blocked, "dependents blocked by failure");
    }
    CoreStep::from_scheduler_step(step)
}

/// Handle a cancellation request.
///
/// Unstarted operations are aborted at once. If anything is still running,
/// the shell is told to signal it and the loop keeps going until those
/// operations report back.
pub fn handle_cancel_requested(scheduler: &mut Scheduler) -> CoreStep {
    let in_flight = scheduler.in_flight();
    let step = scheduler.cancel();
    let mut core_step = CoreStep::from_scheduler_step(step);
    if in_flight > 0 {
        core_step.commands.insert(0, CoreCommand::CancelInFlight);
    }
    core_step
}
