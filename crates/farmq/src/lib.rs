//! farmq: distributed work farming over paired queues.
//!
//! One server fans an open-ended stream of work items out to any number of
//! clients. Each client runs a fixed-size worker pool, admits new work only
//! while a pool slot is free, and funnels all worker output through a single
//! serializer so printouts from concurrent workers never interleave.
//!
//! The server hosts a pair of FIFO queues: a signal queue ("a client wants
//! the next value") and a value queue (produced work items, with `None` as
//! the termination marker). One signal produces exactly one value, in FIFO
//! order; values are fungible across clients.

pub mod bridge;
mod client;
mod config;
mod dispatch;
mod permit;
mod printer;
mod queue;
mod server;

pub use bridge::protocol::WorkItem;
pub use bridge::remote::{RemoteError, RemoteQueues};
pub use client::{Client, ClientError, start_client};
pub use config::{Config, ConfigError, DEFAULT_AUTHKEY, DEFAULT_PORT};
pub use dispatch::{WorkError, WorkHandler, WorkerDispatcher};
pub use permit::{Slot, SlotPool};
pub use printer::{OutputSerializer, PrintRecord, Printer};
pub use queue::ChannelPair;
pub use server::{InputSource, Server, ServerError, start_server};
