use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::dag::graph::OperationGraph;
use crate::dag::operation::{Operation, OperationKey, ScheduledOperation};
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::exec::OperationResult;
use crate::types::OperationStatus;

/// Position in the ready queue: longest critical path first, then by key.
type ReadyEntry = (Reverse<usize>, OperationKey);

/// Scheduler owns the operation graph plus the mutable state of one run.
///
/// It is responsible for:
/// - promoting operations to `Ready` once every dependency succeeded
/// - handing out at most `parallelism` operations at a time
/// - settling runners with a preset status without dispatching them
/// - blocking everything downstream of a failure
/// - aborting unstarted work on cancellation
///
/// The scheduler performs no IO; the runtime feeds it completions and
/// executes whatever it schedules.
#[derive(Debug)]
pub struct Scheduler {
    nodes: BTreeMap<OperationKey, Operation>,
    ready: BTreeSet<ReadyEntry>,
    parallelism: usize,
    in_flight: usize,
    started: bool,
    cancelled: bool,
}

impl Scheduler {
    /// A parallelism of zero is treated as one.
    pub fn new(graph: OperationGraph, parallelism: usize) -> Self {
        Self {
            nodes: graph.into_nodes(),
            ready: BTreeSet::new(),
            parallelism: parallelism.max(1),
            in_flight: 0,
            started: false,
            cancelled: false,
        }
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Number of operations currently `Executing`.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_finished(&self) -> bool {
        self.nodes.values().all(|op| op.status.is_terminal())
    }

    pub fn status_of(&self, key: &OperationKey) -> Option<OperationStatus> {
        self.nodes.get(key).map(|op| op.status)
    }

    pub fn operation(&self, key: &OperationKey) -> Option<&Operation> {
        self.nodes.get(key)
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.nodes.values()
    }

    /// Consume the scheduler and hand back every operation with its final
    /// status and result.
    pub fn into_operations(self) -> Vec<Operation> {
        self.nodes.into_values().collect()
    }

    /// Promote the roots and schedule the first batch.
    ///
    /// Calling `start` twice is a no-op the second time.
    pub fn start(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if self.started {
            warn!("scheduler already started; ignoring");
            return step;
        }
        self.started = true;

        let roots = StateManager::new(&mut self.nodes).promote_roots();
        info!(
            operations = self.nodes.len(),
            roots = roots.len(),
            parallelism = self.parallelism,
            "scheduler: starting run"
        );
        self.enqueue(roots);
        self.settle_and_dispatch(&mut step);
        step.run_just_finished = self.is_finished();
        step
    }

    /// Record the result of an operation previously handed out by the
    /// scheduler and schedule whatever it unblocked.
    pub fn handle_completion(&mut self, key: &OperationKey, result: OperationResult) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        match self.nodes.get(key).map(|op| op.status) {
            Some(OperationStatus::Executing) => {}
            Some(status) => {
                warn!(operation = %key, %status, "completion for operation that is not executing; ignoring");
                return step;
            }
            None => {
                warn!(operation = %key, "completion for unknown operation; ignoring");
                return step;
            }
        }

        self.in_flight = self.in_flight.saturating_sub(1);
        self.finish(key, result, &mut step);
        self.settle_and_dispatch(&mut step);
        step.run_just_finished = self.is_finished();
        step
    }

    /// Stop scheduling. Every operation that has not started becomes
    /// `Aborted`; operations already executing keep running until the
    /// runtime reports them.
    pub fn cancel(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if self.cancelled {
            return step;
        }
        self.cancelled = true;
        self.ready.clear();

        step.newly_aborted = StateManager::new(&mut self.nodes).abort_unstarted();
        for key in step.newly_aborted.iter() {
            self.set_result(key, OperationResult::with_status(OperationStatus::Aborted));
        }
        info!(
            aborted = step.newly_aborted.len(),
            in_flight = self.in_flight,
            "scheduler: run cancelled"
        );
        step.run_just_finished = self.is_finished();
        step
    }

    fn enqueue(&mut self, keys: Vec<OperationKey>) {
        for key in keys {
            let critical_path = self.nodes.get(&key).map(|op| op.critical_path).unwrap_or(1);
            self.ready.insert((Reverse(critical_path), key));
        }
    }

    /// Apply a terminal result to `key` and propagate it to dependents.
    fn finish(&mut self, key: &OperationKey, result: OperationResult, step: &mut SchedulerStep) {
        let status = result.status;
        let mut manager = StateManager::new(&mut self.nodes);
        if !status.is_terminal() || !manager.transition(key, status) {
            warn!(operation = %key, %status, "result rejected; marking failure");
            // A runner that reports a non-terminal status is a bug; the
            // operation must still end.
            let forced = OperationResult {
                status: OperationStatus::Failure,
                error: Some(format!("runner reported non-terminal status '{status}'")),
                ..result
            };
            if !manager.transition(key, OperationStatus::Failure) {
                return;
            }
            drop(manager);
            self.set_result(key, forced);
            self.propagate(key, OperationStatus::Failure, step);
            return;
        }
        drop(manager);

        debug!(operation = %key, %status, "operation finished");
        self.set_result(key, result);
        self.propagate(key, status, step);
    }

    fn propagate(&mut self, key: &OperationKey, status: OperationStatus, step: &mut SchedulerStep) {
        let mut manager = StateManager::new(&mut self.nodes);
        if status.blocks_dependents() {
            let blocked = manager.block_dependents(key);
            if !blocked.is_empty() {
                warn!(operation = %key, blocked = blocked.len(), "blocking dependents");
            }
            for blocked_key in blocked.iter() {
                self.ready.retain(|(_, k)| k != blocked_key);
                self.set_result(blocked_key, OperationResult::with_status(OperationStatus::Blocked));
            }
            step.newly_blocked.extend(blocked);
        } else if !self.cancelled {
            let promoted = manager.promote_dependents(key);
            self.enqueue(promoted);
        }
    }

    /// Settle every ready no-op, then dispatch shell runners up to the
    /// parallelism cap.
    fn settle_and_dispatch(&mut self, step: &mut SchedulerStep) {
        if self.cancelled {
            return;
        }

        loop {
            let preset: Vec<(ReadyEntry, OperationStatus)> = self
                .ready
                .iter()
                .filter_map(|entry| {
                    let op = self.nodes.get(&entry.1)?;
                    // Presets the state machine cannot apply from `Ready` are
                    // dispatched like any other runner instead.
                    op.runner
                        .preset_status()
                        .filter(|status| status.is_terminal() && OperationStatus::Ready.can_transition_to(*status))
                        .map(|status| (entry.clone(), status))
                })
                .collect();
            if preset.is_empty() {
                break;
            }
            for (entry, status) in preset {
                self.ready.remove(&entry);
                let key = entry.1;
                // An earlier settle in this batch may have blocked it.
                if self.status_of(&key) != Some(OperationStatus::Ready) {
                    continue;
                }
                self.finish(&key, OperationResult::with_status(status), step);
                step.newly_settled.push(key);
            }
        }

        while self.in_flight < self.parallelism {
            let Some((_, key)) = self.ready.pop_first() else {
                break;
            };
            if !StateManager::new(&mut self.nodes).transition(&key, OperationStatus::Executing) {
                continue;
            }
            self.in_flight += 1;
            if let Some(op) = self.nodes.get(&key) {
                debug!(operation = %op.display_name, in_flight = self.in_flight, "dispatching operation");
                step.newly_scheduled.push(ScheduledOperation::from_operation(op));
            }
        }
    }

    fn set_result(&mut self, key: &OperationKey, result: OperationResult) {
        if let Some(op) = self.nodes.get_mut(key) {
            op.result = Some(result);
        }
    }
}
