// src/exec/noop.rs

use crate::exec::runner::OperationResult;
use crate::types::OperationStatus;

/// Runner for operations with nothing to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoOpOperationRunner {
    pub display_name: String,
    /// Status reported for every execution.
    pub result: OperationStatus,
    pub silent: bool,
}

impl NoOpOperationRunner {
    pub fn new(display_name: impl Into<String>, result: OperationStatus, silent: bool) -> Self {
        Self {
            display_name: display_name.into(),
            result,
            silent,
        }
    }

    pub fn execute(&self) -> OperationResult {
        OperationResult::with_status(self.result)
    }
}
