// src/dag/state_manager.rs

//! Status transitions and their propagation through the graph.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use crate::dag::operation::{Operation, OperationKey};
use crate::types::OperationStatus;

/// Aggregate state of an operation's dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyState {
    /// Some dependency is not terminal yet.
    Pending,
    /// Every dependency finished successfully.
    Satisfied,
    /// Some dependency failed, was blocked, or was aborted.
    Blocked,
}

/// Applies status transitions to a node map.
pub struct StateManager<'a> {
    nodes: &'a mut BTreeMap<OperationKey, Operation>,
}

impl<'a> StateManager<'a> {
    pub fn new(nodes: &'a mut BTreeMap<OperationKey, Operation>) -> Self {
        Self { nodes }
    }

    pub fn dependency_state(&self, key: &OperationKey) -> DependencyState {
        let Some(op) = self.nodes.get(key) else {
            return DependencyState::Pending;
        };

        let mut pending = false;
        for dep_key in op.dependencies.iter() {
            let Some(dep) = self.nodes.get(dep_key) else {
                warn!(operation = %key, dependency = %dep_key, "dependency missing from graph");
                return DependencyState::Blocked;
            };
            if dep.status.blocks_dependents() {
                return DependencyState::Blocked;
            }
            if !dep.status.is_terminal() {
                pending = true;
            }
        }

        if pending {
            DependencyState::Pending
        } else {
            DependencyState::Satisfied
        }
    }

    /// Move `key` to `next` if the state machine allows it.
    ///
    /// Illegal transitions are logged and ignored; statuses never move
    /// backwards.
    pub fn transition(&mut self, key: &OperationKey, next: OperationStatus) -> bool {
        let Some(op) = self.nodes.get_mut(key) else {
            warn!(operation = %key, "transition for unknown operation; ignoring");
            return false;
        };
        if !op.status.can_transition_to(next) {
            warn!(
                operation = %op.display_name,
                from = %op.status,
                to = %next,
                "illegal status transition; ignoring"
            );
            return false;
        }
        debug!(operation = %op.display_name, from = %op.status, to = %next, "status transition");
        op.status = next;
        true
    }

    /// `Waiting` operations without pending dependencies become `Ready`.
    pub fn promote_roots(&mut self) -> Vec<OperationKey> {
        let candidates: Vec<OperationKey> = self
            .nodes
            .values()
            .filter(|op| op.status == OperationStatus::Waiting)
            .map(|op| op.key.clone())
            .collect();

        let mut promoted = Vec::new();
        for key in candidates {
            if self.dependency_state(&key) == DependencyState::Satisfied
                && self.transition(&key, OperationStatus::Ready)
            {
                promoted.push(key);
            }
        }
        promoted
    }

    /// Direct dependents of `finished` that are now `Ready`.
    pub fn promote_dependents(&mut self, finished: &OperationKey) -> Vec<OperationKey> {
        let dependents: Vec<OperationKey> = match self.nodes.get(finished) {
            Some(op) => op.dependents.iter().cloned().collect(),
            None => return Vec::new(),
        };

        let mut promoted = Vec::new();
        for key in dependents {
            let waiting = self
                .nodes
                .get(&key)
                .is_some_and(|op| op.status == OperationStatus::Waiting);
            if waiting
                && self.dependency_state(&key) == DependencyState::Satisfied
                && self.transition(&key, OperationStatus::Ready)
            {
                promoted.push(key);
            }
        }
        promoted
    }

    /// Mark every not-yet-started operation downstream of `failed` as
    /// `Blocked`, transitively.
    ///
    /// Returns the newly blocked operations (excluding `failed` itself).
    pub fn block_dependents(&mut self, failed: &OperationKey) -> Vec<OperationKey> {
        let mut stack: Vec<OperationKey> = match self.nodes.get(failed) {
            Some(op) => op.dependents.iter().cloned().collect(),
            None => return Vec::new(),
        };
        let mut visited: HashSet<OperationKey> = HashSet::new();
        let mut blocked = Vec::new();

        while let Some(key) = stack.pop() {
            if !visited.insert(key.clone()) {
                continue;
            }
            let Some(op) = self.nodes.get(&key) else {
                continue;
            };
            match op.status {
                OperationStatus::Waiting | OperationStatus::Ready => {
                    let dependents: Vec<OperationKey> = op.dependents.iter().cloned().collect();
                    if self.transition(&key, OperationStatus::Blocked) {
                        blocked.push(key);
                        stack.extend(dependents);
                    }
                }
                // Executing or already terminal; nothing to do.
                _ => {}
            }
        }

        blocked
    }

    /// Abort every operation that has not started.
    pub fn abort_unstarted(&mut self) -> Vec<OperationKey> {
        let candidates: Vec<OperationKey> = self
            .nodes
            .values()
            .filter(|op| matches!(op.status, OperationStatus::Waiting | OperationStatus::Ready))
            .map(|op| op.key.clone())
            .collect();

        candidates
            .into_iter()
            .filter(|key| self.transition(key, OperationStatus::Aborted))
            .collect()
    }
}
