use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use phasegraph::dag::{OperationKey, ScheduledOperation};
use phasegraph::engine::RuntimeEvent;
use phasegraph::errors::Result;
use phasegraph::exec::{ExecutorBackend, OperationResult};
use phasegraph::types::OperationStatus;

/// A fake executor that:
/// - records which operations were "run", in dispatch order
/// - immediately reports `OperationCompleted` for each one, with `Success`
///   unless a different status was configured for that operation.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<OperationKey>>>,
    outcomes: BTreeMap<OperationKey, OperationStatus>,
    cancellations: Arc<Mutex<usize>>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<OperationKey>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            outcomes: BTreeMap::new(),
            cancellations: Arc::new(Mutex::new(0)),
        }
    }

    /// Report `status` whenever `key` is executed.
    pub fn with_outcome(mut self, key: OperationKey, status: OperationStatus) -> Self {
        self.outcomes.insert(key, status);
        self
    }

    /// Number of times `cancel_all` was called.
    pub fn cancellations(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.cancellations)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_operations(
        &mut self,
        operations: Vec<ScheduledOperation>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);

        Box::pin(async move {
            for op in operations {
                {
                    let mut guard = executed.lock().unwrap();
                    guard.push(op.key.clone());
                }

                let status = self
                    .outcomes
                    .get(&op.key)
                    .copied()
                    .unwrap_or(OperationStatus::Success);
                let mut result = OperationResult::with_status(status);
                result.exit_code = Some(if status == OperationStatus::Failure { 1 } else { 0 });

                tx.send(RuntimeEvent::OperationCompleted {
                    key: op.key,
                    result,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }

    fn cancel_all(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let cancellations = Arc::clone(&self.cancellations);
        Box::pin(async move {
            *cancellations.lock().unwrap() += 1;
            Ok(())
        })
    }
}
