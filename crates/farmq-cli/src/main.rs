//! Demo endpoints: a number-serving server and a sleepy worker client.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use farmq::{
    Config, InputSource, Printer, WorkError, WorkHandler, WorkItem, start_client, start_server,
};

#[derive(Parser)]
#[command(name = "farmq", about = "Farm work items from one server to many worker pools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve a bounded stream of numbers.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long, default_value_t = farmq::DEFAULT_PORT)]
        port: u16,

        #[arg(long, default_value = farmq::DEFAULT_AUTHKEY)]
        authkey: String,

        /// How many numbers to serve before signalling termination.
        #[arg(long, default_value_t = 20)]
        count: u64,
    },

    /// Process numbers on a local worker pool.
    Work {
        #[arg(long, default_value = "localhost")]
        server: String,

        #[arg(long, default_value_t = farmq::DEFAULT_PORT)]
        port: u16,

        #[arg(long, default_value = farmq::DEFAULT_AUTHKEY)]
        authkey: String,

        /// Worker pool size.
        #[arg(long, default_value = "4")]
        jobs: NonZeroUsize,
    },
}

/// Serves `limit` numbers, then the termination marker forever.
struct NumberSource {
    served: u64,
    limit: u64,
}

#[async_trait::async_trait]
impl InputSource for NumberSource {
    async fn next(&mut self) -> anyhow::Result<Option<WorkItem>> {
        if self.served >= self.limit {
            // The input loop re-asks on every signal; keep answering with
            // the marker so every client sees the stream end.
            return Ok(None);
        }

        self.served += 1;
        let jitter = self.served.wrapping_mul(2654435761) % 99 + 1;
        Ok(Some(serde_json::json!(self.served * 100 + jitter)))
    }
}

/// Pretends to work on each number for a little while.
struct SleepyHandler;

#[async_trait::async_trait]
impl WorkHandler for SleepyHandler {
    async fn run(&self, item: WorkItem, printer: Printer) -> Result<WorkItem, WorkError> {
        printer.line(format!("input={item} started"));

        let millis = item.as_u64().unwrap_or(0) % 700 + 400;
        tokio::time::sleep(Duration::from_millis(millis)).await;

        printer.line(format!("input={item} finished"));
        Ok(item)
    }

    fn on_success(&self, result: WorkItem) {
        tracing::info!(%result, "workload finished");
    }

    fn on_failure(&self, error: WorkError) {
        tracing::error!(%error, "workload failed");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match Cli::parse().command {
        Command::Serve {
            host,
            port,
            authkey,
            count,
        } => {
            let config = Config::new(host, port, authkey)?;
            let source = NumberSource {
                served: 0,
                limit: count,
            };
            start_server(&config, source).await?;
        }

        Command::Work {
            server,
            port,
            authkey,
            jobs,
        } => {
            let config = Config::new(server, port, authkey)?;
            start_client(&config, Arc::new(SleepyHandler), jobs).await?;
        }
    }

    Ok(())
}
