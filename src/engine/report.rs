// src/engine/report.rs

//! Aggregate result of a run.

use std::fmt::Write as _;
use std::time::Duration;

use crate::dag::{Operation, OperationKey};
use crate::types::OperationStatus;

/// Final state of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    pub key: OperationKey,
    pub display_name: String,
    pub status: OperationStatus,
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub output: String,
    pub error: Option<String>,
    /// Silent operations are counted for success but not listed.
    pub silent: bool,
}

impl OperationRecord {
    pub fn from_operation(op: Operation) -> Self {
        let silent = op.runner.is_silent();
        let (exit_code, duration, output, error) = match op.result {
            Some(r) => (r.exit_code, r.duration, r.output, r.error),
            None => (None, Duration::ZERO, String::new(), None),
        };
        Self {
            key: op.key,
            display_name: op.display_name,
            status: op.status,
            exit_code,
            duration,
            output,
            error,
            silent,
        }
    }
}

/// Every operation's terminal status plus the wall-clock time of the run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub records: Vec<OperationRecord>,
    pub elapsed: Duration,
}

impl ExecutionReport {
    pub fn from_operations(operations: Vec<Operation>, elapsed: Duration) -> Self {
        Self {
            records: operations.into_iter().map(OperationRecord::from_operation).collect(),
            elapsed,
        }
    }

    /// The run failed iff at least one operation failed.
    pub fn is_success(&self) -> bool {
        !self.records.iter().any(|r| r.status == OperationStatus::Failure)
    }

    pub fn record(&self, key: &OperationKey) -> Option<&OperationRecord> {
        self.records.iter().find(|r| &r.key == key)
    }

    pub fn status_of(&self, key: &OperationKey) -> Option<OperationStatus> {
        self.record(key).map(|r| r.status)
    }

    pub fn count(&self, status: OperationStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn with_status(&self, status: OperationStatus) -> impl Iterator<Item = &OperationRecord> {
        self.records.iter().filter(move |r| r.status == status)
    }

    /// Human-readable summary printed at the end of a run.
    pub fn render_summary(&self) -> String {
        const ORDER: [OperationStatus; 7] = [
            OperationStatus::Success,
            OperationStatus::FromCache,
            OperationStatus::Skipped,
            OperationStatus::NoOp,
            OperationStatus::Failure,
            OperationStatus::Blocked,
            OperationStatus::Aborted,
        ];

        let visible: Vec<&OperationRecord> = self.records.iter().filter(|r| !r.silent).collect();
        let mut out = String::new();

        let _ = writeln!(out, "==[ SUMMARY ]==");
        let counts: Vec<String> = ORDER
            .iter()
            .filter_map(|status| {
                let n = visible.iter().filter(|r| r.status == *status).count();
                (n > 0).then(|| format!("{status}: {n}"))
            })
            .collect();
        if counts.is_empty() {
            let _ = writeln!(out, "no operations");
        } else {
            let _ = writeln!(out, "{}", counts.join(", "));
        }

        for record in visible.iter().filter(|r| r.status == OperationStatus::Failure) {
            let code = record
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string());
            let _ = writeln!(
                out,
                "\nFAILURE {} (exit code {code}, {:.2}s)",
                record.display_name,
                record.duration.as_secs_f64()
            );
            if let Some(ref error) = record.error {
                let _ = writeln!(out, "  error: {error}");
            }
            for line in record.output.lines() {
                let _ = writeln!(out, "  {line}");
            }
        }

        let blocked: Vec<&str> = visible
            .iter()
            .filter(|r| r.status == OperationStatus::Blocked)
            .map(|r| r.display_name.as_str())
            .collect();
        if !blocked.is_empty() {
            let _ = writeln!(out, "\nBLOCKED (a dependency did not succeed):");
            for name in blocked {
                let _ = writeln!(out, "  {name}");
            }
        }

        let aborted: Vec<&str> = visible
            .iter()
            .filter(|r| r.status == OperationStatus::Aborted)
            .map(|r| r.display_name.as_str())
            .collect();
        if !aborted.is_empty() {
            let _ = writeln!(out, "\nABORTED:");
            for name in aborted {
                let _ = writeln!(out, "  {name}");
            }
        }

        let verdict = if self.is_success() { "SUCCESS" } else { "FAILURE" };
        let _ = write!(
            out,
            "\n{verdict}: {} operations in {:.2}s",
            self.records.len(),
            self.elapsed.as_secs_f64()
        );
        out
    }
}
