// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning runners
//! itself. This makes it easy to swap in a fake executor in tests while
//! keeping the production implementation here.
//!
//! - `RealExecutorBackend` runs each scheduled operation's runner in its own
//!   Tokio task and reports the result as `RuntimeEvent::OperationCompleted`.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which operations were scheduled and directly emits completion events.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::dag::{OperationKey, ScheduledOperation};
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::exec::runner::{OperationResult, RunnerContext};

/// Trait abstracting how scheduled operations are executed.
///
/// Production code uses [`RealExecutorBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ExecutorBackend: Send {
    /// Start executing the given operations.
    ///
    /// Every operation handed in must eventually produce exactly one
    /// `OperationCompleted` event, including after `cancel_all`.
    fn spawn_ready_operations(
        &mut self,
        operations: Vec<ScheduledOperation>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Ask every in-flight operation to stop.
    fn cancel_all(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor backend used in production.
pub struct RealExecutorBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cancel_tx: watch::Sender<bool>,
    grace_period: Duration,
    active: HashMap<OperationKey, JoinHandle<()>>,
}

impl RealExecutorBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, grace_period: Duration) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            runtime_tx,
            cancel_tx,
            grace_period,
            active: HashMap::new(),
        }
    }

    fn spawn_one(&mut self, operation: ScheduledOperation) {
        let ctx = RunnerContext::new(self.cancel_tx.subscribe(), self.grace_period);
        let tx = self.runtime_tx.clone();
        let key = operation.key.clone();

        info!(operation = %operation.display_name, cmd = ?operation.runner.command_line(), "starting operation");

        let handle = tokio::spawn(async move {
            let runner = operation.runner;
            // Run the runner in a nested task so a panic still produces a
            // completion event instead of stalling the run.
            let inner = tokio::spawn(async move { runner.execute(&ctx).await });
            let result = match inner.await {
                Ok(result) => result,
                Err(err) => {
                    error!(operation = %operation.display_name, error = %err, "runner task failed");
                    OperationResult::infrastructure_failure(format!("runner task failed: {err}"))
                }
            };

            debug!(
                operation = %operation.display_name,
                status = %result.status,
                exit_code = ?result.exit_code,
                "operation finished"
            );
            if tx
                .send(RuntimeEvent::OperationCompleted {
                    key: operation.key,
                    result,
                })
                .await
                .is_err()
            {
                debug!(operation = %operation.display_name, "runtime gone; dropping completion");
            }
        });

        self.active.retain(|_, h| !h.is_finished());
        self.active.insert(key, handle);
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_operations(
        &mut self,
        operations: Vec<ScheduledOperation>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for operation in operations {
                self.spawn_one(operation);
            }
            Ok(())
        })
    }

    fn cancel_all(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.active.retain(|_, h| !h.is_finished());
            info!(in_flight = self.active.len(), "signalling in-flight operations to stop");
            // `send_replace` stores the value even if no receiver is alive.
            self.cancel_tx.send_replace(true);
            Ok(())
        })
    }
}
