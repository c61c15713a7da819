// src/dag/operation.rs

//! Operation nodes and the handles the scheduler hands to executors.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::exec::{OperationResult, OperationRunner};
use crate::types::OperationStatus;

/// Identity of an operation: at most one exists per (phase, project).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey {
    pub project: String,
    pub phase: String,
}

impl OperationKey {
    pub fn new(phase: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            phase: phase.into(),
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.project, self.phase)
    }
}

/// A vertex of the operation graph.
#[derive(Debug)]
pub struct Operation {
    pub key: OperationKey,
    pub display_name: String,
    pub runner: Arc<OperationRunner>,
    /// Operations that must be terminal before this one may run.
    pub dependencies: BTreeSet<OperationKey>,
    /// Operations that list this one as a dependency.
    pub dependents: BTreeSet<OperationKey>,
    pub status: OperationStatus,
    /// Length of the longest chain of dependents, this node included.
    pub critical_path: usize,
    pub result: Option<OperationResult>,
}

impl Operation {
    pub fn new(key: OperationKey, runner: OperationRunner) -> Self {
        Self {
            display_name: runner.display_name().to_string(),
            key,
            runner: Arc::new(runner),
            dependencies: BTreeSet::new(),
            dependents: BTreeSet::new(),
            status: OperationStatus::Waiting,
            critical_path: 1,
            result: None,
        }
    }
}

/// An operation the scheduler wants executed now.
#[derive(Debug, Clone)]
pub struct ScheduledOperation {
    pub key: OperationKey,
    pub display_name: String,
    pub runner: Arc<OperationRunner>,
}

impl ScheduledOperation {
    pub fn from_operation(op: &Operation) -> Self {
        Self {
            key: op.key.clone(),
            display_name: op.display_name.clone(),
            runner: Arc::clone(&op.runner),
        }
    }
}
