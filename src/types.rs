// src/types.rs

//! Small shared enums used across the workspace model, runners and scheduler.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a single operation.
///
/// Allowed transitions:
///
/// ```text
/// Waiting ──► Ready ──► Executing ──► Success | Failure | FromCache
///    │          ├──────────────────► FromCache | Skipped | NoOp
///    └──────────┴──► Blocked
/// Waiting | Ready | Executing ──► Aborted
/// ```
///
/// Every state from `Success` onwards is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Some dependency has not reached a terminal state yet.
    Waiting,
    /// All dependencies succeeded; eligible to run.
    Ready,
    Executing,
    Success,
    Failure,
    /// A previously computed result was reused instead of executing.
    FromCache,
    Skipped,
    NoOp,
    /// A dependency failed; this operation will never run.
    Blocked,
    /// The run was cancelled before this operation could finish.
    Aborted,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            OperationStatus::Waiting | OperationStatus::Ready | OperationStatus::Executing
        )
    }

    /// Terminal states that let dependents proceed.
    pub fn is_successful(self) -> bool {
        matches!(
            self,
            OperationStatus::Success
                | OperationStatus::FromCache
                | OperationStatus::Skipped
                | OperationStatus::NoOp
        )
    }

    /// Terminal states that block every dependent.
    pub fn blocks_dependents(self) -> bool {
        matches!(
            self,
            OperationStatus::Failure | OperationStatus::Blocked | OperationStatus::Aborted
        )
    }

    pub fn can_transition_to(self, next: OperationStatus) -> bool {
        use OperationStatus::*;
        match (self, next) {
            (Waiting, Ready | Blocked | Aborted) => true,
            (Ready, Executing | FromCache | Skipped | NoOp | Blocked | Aborted) => true,
            (Executing, Success | Failure | FromCache | Aborted) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::Waiting => "waiting",
            OperationStatus::Ready => "ready",
            OperationStatus::Executing => "executing",
            OperationStatus::Success => "success",
            OperationStatus::Failure => "failure",
            OperationStatus::FromCache => "from cache",
            OperationStatus::Skipped => "skipped",
            OperationStatus::NoOp => "no-op",
            OperationStatus::Blocked => "blocked",
            OperationStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform family whose shell will interpret resolved command lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionTarget {
    Posix,
    Windows,
}

impl ExecutionTarget {
    pub fn host() -> Self {
        if cfg!(windows) {
            ExecutionTarget::Windows
        } else {
            ExecutionTarget::Posix
        }
    }
}

impl Default for ExecutionTarget {
    fn default() -> Self {
        ExecutionTarget::host()
    }
}

/// Where build cache entries are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// One JSON file per fingerprint under the cache directory.
    #[default]
    File,
    /// In memory only (lost on exit).
    Memory,
}

