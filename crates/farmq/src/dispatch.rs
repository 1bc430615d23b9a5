//! Worker dispatcher: a fixed-size pool of concurrent workload executions.
//!
//! Dispatch never blocks; admission is handled upstream by the slot pool. A
//! workload failure or panic is contained to its task and routed to the
//! failure continuation; the slot travels with the task and is released
//! exactly once when it finishes, whatever the outcome.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::task::TaskTracker;

use crate::bridge::protocol::WorkItem;
use crate::permit::Slot;
use crate::printer::Printer;

/// Workload failure, as delivered to the failure continuation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkError {
    #[error("workload failed: {0}")]
    Failed(String),

    #[error("workload panicked: {0}")]
    Panicked(String),
}

impl WorkError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Strategy object for the client-side workload and its continuations.
#[async_trait::async_trait]
pub trait WorkHandler: Send + Sync + 'static {
    /// Execute one unit of work. All output goes through `printer`, never
    /// directly to stdout.
    async fn run(&self, item: WorkItem, printer: Printer) -> Result<WorkItem, WorkError>;

    /// Success continuation, invoked with the workload's result.
    fn on_success(&self, _result: WorkItem) {}

    /// Failure continuation, invoked with the contained error.
    fn on_failure(&self, _error: WorkError) {}
}

/// Runs workloads as concurrent tasks and tracks them until drain.
///
/// Workloads run as tasks in the client process rather than OS processes; a
/// panicking workload is caught and converted into a failure continuation
/// instead of crashing the controller.
pub struct WorkerDispatcher<H> {
    handler: Arc<H>,
    printer: Printer,
    tasks: TaskTracker,
}

impl<H: WorkHandler> WorkerDispatcher<H> {
    pub fn new(handler: Arc<H>, printer: Printer) -> Self {
        Self {
            handler,
            printer,
            tasks: TaskTracker::new(),
        }
    }

    /// Run `item` asynchronously, releasing `slot` when the task finishes.
    pub fn dispatch(&self, item: WorkItem, slot: Slot) {
        let handler = Arc::clone(&self.handler);
        let printer = self.printer.clone();

        self.tasks.spawn(async move {
            let _slot = slot;

            let outcome = AssertUnwindSafe(handler.run(item, printer))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(result)) => handler.on_success(result),
                Ok(Err(error)) => {
                    tracing::debug!(%error, "workload failed");
                    handler.on_failure(error);
                }
                Err(panic) => {
                    let error = WorkError::Panicked(panic_message(panic));
                    tracing::warn!(%error, "workload panicked");
                    handler.on_failure(error);
                }
            }
        });
    }

    /// Stop accepting work and wait for every in-flight task to finish.
    pub async fn shutdown(self) {
        self.tasks.close();
        self.tasks.wait().await;
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
