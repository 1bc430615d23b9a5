//! Server side: TCP listener, authentication, and the input loop.
//!
//! The input loop is the single consumer of signals and single producer of
//! values: receive one signal, invoke the source once, send the result
//! (termination marker included) to the value queue. Exactly one production
//! per signal; a slow source stalls every client, since there is one loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::bridge::codec::JsonCodec;
use crate::bridge::protocol::{ClientRequest, ServerReply, WorkItem};
use crate::config::Config;
use crate::queue::ChannelPair;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error("input source failed: {0}")]
    Produce(#[source] anyhow::Error),
}

/// Server-side strategy producing the stream of work items.
#[async_trait::async_trait]
pub trait InputSource: Send + 'static {
    /// Produce the next work item, or `Ok(None)` to emit the termination
    /// marker.
    ///
    /// The input loop keeps no memory of having emitted the marker and calls
    /// `next` again on every later signal, so a source must keep returning
    /// `None` once exhausted or later clients will receive a resumed stream.
    /// An error is fatal to the server.
    async fn next(&mut self) -> anyhow::Result<Option<WorkItem>>;
}

/// A bound listener plus the channel pair it serves.
pub struct Server {
    listener: TcpListener,
    authkey: String,
    pair: Arc<ChannelPair>,
}

impl Server {
    /// Bind the listener and register the channel pair. Must complete before
    /// any client performs a channel operation.
    pub async fn bind(config: &Config) -> Result<Self, ServerError> {
        let addr = config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            authkey: config.authkey().to_string(),
            pair: Arc::new(ChannelPair::new()),
        })
    }

    /// The bound address; useful when the config asked for port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the input loop and serve connections.
    ///
    /// Never returns under normal operation; a source error is fatal and
    /// surfaces here (no retry).
    pub async fn serve<S: InputSource>(self, source: S) -> Result<(), ServerError> {
        let pair = Arc::clone(&self.pair);
        let mut input_loop = tokio::spawn(input_loop(source, pair));

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    tracing::debug!(%peer, "client connected");

                    let pair = Arc::clone(&self.pair);
                    let authkey = self.authkey.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, pair, authkey).await {
                            tracing::debug!(%peer, error = %e, "connection ended with error");
                        }
                        tracing::debug!(%peer, "client disconnected");
                    });
                }

                finished = &mut input_loop => {
                    return match finished {
                        Ok(Err(e)) => Err(ServerError::Produce(e)),
                        Ok(Ok(())) => Ok(()),
                        Err(join_err) => Err(ServerError::Produce(anyhow::anyhow!(
                            "input loop panicked: {join_err}"
                        ))),
                    };
                }
            }
        }
    }
}

/// Bind and serve forever.
pub async fn start_server<S: InputSource>(config: &Config, source: S) -> Result<(), ServerError> {
    let server = Server::bind(config).await?;
    tracing::info!(addr = %server.local_addr()?, "farmq server listening");
    server.serve(source).await
}

/// WAITING -> PRODUCING -> SENT -> WAITING, one production per signal.
async fn input_loop<S: InputSource>(mut source: S, pair: Arc<ChannelPair>) -> anyhow::Result<()> {
    loop {
        pair.recv_signal().await;
        tracing::trace!("signal received");

        let item = source.next().await?;
        match &item {
            Some(_) => tracing::trace!("item produced"),
            None => tracing::debug!("termination marker produced"),
        }

        pair.send_value(item);
    }
}

async fn handle_connection(
    stream: TcpStream,
    pair: Arc<ChannelPair>,
    authkey: String,
) -> io::Result<()> {
    let (read, write) = stream.into_split();
    let mut reader = FramedRead::new(read, JsonCodec::<ClientRequest>::new());
    let mut writer = FramedWrite::new(write, JsonCodec::<ServerReply>::new());

    // Authentication first. A wrong key or any other first frame gets the
    // same refusal, then the connection closes.
    match reader.next().await {
        Some(Ok(ClientRequest::Hello { authkey: offered })) if offered == authkey => {
            writer.send(ServerReply::Welcome).await?;
        }
        Some(Ok(_)) => {
            tracing::warn!("rejecting client: failed handshake");
            writer.send(ServerReply::Denied).await?;
            return Ok(());
        }
        Some(Err(e)) => return Err(e),
        None => return Ok(()),
    }

    while let Some(request) = reader.next().await {
        let reply = match request? {
            ClientRequest::Hello { .. } => {
                tracing::warn!("duplicate hello after handshake");
                ServerReply::Denied
            }
            ClientRequest::SendSignal => {
                pair.send_signal();
                ServerReply::SignalQueued
            }
            ClientRequest::RecvValue { wait: true } => ServerReply::Value {
                item: pair.recv_value().await,
            },
            ClientRequest::RecvValue { wait: false } => match pair.try_recv_value() {
                Some(item) => ServerReply::Value { item },
                None => ServerReply::Empty,
            },
        };

        let close = matches!(reply, ServerReply::Denied);
        writer.send(reply).await?;
        if close {
            break;
        }
    }

    Ok(())
}
