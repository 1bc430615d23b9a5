//! Client session: admission-controlled dispatch until the stream ends.
//!
//! One slot per in-flight workload, acquired before a value is requested and
//! released when the dispatched task finishes. The session ends when the
//! termination marker arrives: outstanding tasks drain, then the output
//! serializer is torn down.

use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::bridge::protocol::WorkItem;
use crate::bridge::remote::{RemoteError, RemoteQueues};
use crate::config::Config;
use crate::dispatch::{WorkHandler, WorkerDispatcher};
use crate::permit::SlotPool;
use crate::printer::OutputSerializer;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// One client session against a farmq server.
pub struct Client {
    config: Config,
    pool_size: NonZeroUsize,
    sink: Box<dyn Write + Send>,
}

impl Client {
    pub fn new(config: Config, pool_size: NonZeroUsize) -> Self {
        Self {
            config,
            pool_size,
            sink: Box::new(io::stdout()),
        }
    }

    /// Route serialized output somewhere other than stdout.
    pub fn with_output<W: Write + Send + 'static>(mut self, sink: W) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Run the admission loop until the termination marker is observed and
    /// all dispatched work has drained.
    pub async fn run<H: WorkHandler>(self, handler: Arc<H>) -> Result<(), ClientError> {
        let mut queues = RemoteQueues::connect(&self.config).await?;
        tracing::debug!(pool_size = self.pool_size.get(), "client session starting");

        let serializer = OutputSerializer::spawn(self.sink);
        let pool = SlotPool::new(self.pool_size);
        let dispatcher = WorkerDispatcher::new(handler, serializer.printer());

        loop {
            let slot = pool.acquire().await;

            // Channel failure is fatal to the session: no retry, no
            // reconnect. In-flight tasks are abandoned to the runtime.
            let item = next_item(&mut queues).await?;

            let Some(item) = item else {
                // Termination: release the just-acquired slot and stop
                // admitting new work.
                drop(slot);
                tracing::debug!("termination marker received");
                break;
            };

            dispatcher.dispatch(item, slot);
        }

        // Drain outstanding tasks before stopping the serializer so every
        // queued record is materialized first.
        dispatcher.shutdown().await;
        serializer.shutdown().await;
        tracing::debug!("client session drained");

        Ok(())
    }
}

/// Obtain the next value: fast path first, then one signal for one value.
async fn next_item(queues: &mut RemoteQueues) -> Result<Option<WorkItem>, RemoteError> {
    if let Some(item) = queues.try_recv_value().await? {
        return Ok(item);
    }

    queues.send_signal().await?;
    queues.recv_value().await
}

/// Connect and process work until the producer signals termination and all
/// dispatched work drains.
pub async fn start_client<H: WorkHandler>(
    config: &Config,
    handler: Arc<H>,
    pool_size: NonZeroUsize,
) -> Result<(), ClientError> {
    Client::new(config.clone(), pool_size).run(handler).await
}
