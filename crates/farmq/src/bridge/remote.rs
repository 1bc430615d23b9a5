//! Client-side handle to the server's channel pair.
//!
//! Every operation is one request/reply round trip over a single framed TCP
//! connection. Any failure is fatal to the session: there is no retry and no
//! reconnect.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};

use super::codec::JsonCodec;
use super::protocol::{ClientRequest, ServerReply, WorkItem};
use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("channel failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("server rejected the authkey")]
    AuthRejected,

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("protocol violation: unexpected reply {0:?}")]
    UnexpectedReply(ServerReply),
}

/// Authenticated connection to the server's signal and value queues.
#[derive(Debug)]
pub struct RemoteQueues {
    reader: FramedRead<OwnedReadHalf, JsonCodec<ServerReply>>,
    writer: FramedWrite<OwnedWriteHalf, JsonCodec<ClientRequest>>,
}

impl RemoteQueues {
    /// Connect and authenticate. Fails with an I/O error when the server is
    /// not listening and with [`RemoteError::AuthRejected`] on an authkey
    /// mismatch.
    pub async fn connect(config: &Config) -> Result<Self, RemoteError> {
        let stream = TcpStream::connect(config.addr()).await?;
        let (read, write) = stream.into_split();
        let mut queues = Self {
            reader: FramedRead::new(read, JsonCodec::new()),
            writer: FramedWrite::new(write, JsonCodec::new()),
        };

        let hello = ClientRequest::Hello {
            authkey: config.authkey().to_string(),
        };
        match queues.round_trip(hello).await? {
            ServerReply::Welcome => Ok(queues),
            ServerReply::Denied => Err(RemoteError::AuthRejected),
            other => Err(RemoteError::UnexpectedReply(other)),
        }
    }

    /// Ask the input loop for one more unit of production.
    pub async fn send_signal(&mut self) -> Result<(), RemoteError> {
        match self.round_trip(ClientRequest::SendSignal).await? {
            ServerReply::SignalQueued => Ok(()),
            other => Err(RemoteError::UnexpectedReply(other)),
        }
    }

    /// Blocking receive on the value queue. Guaranteed to return once a
    /// signal has been sent, by the 1:1 signal/value pairing.
    pub async fn recv_value(&mut self) -> Result<Option<WorkItem>, RemoteError> {
        match self.round_trip(ClientRequest::RecvValue { wait: true }).await? {
            ServerReply::Value { item } => Ok(item),
            other => Err(RemoteError::UnexpectedReply(other)),
        }
    }

    /// Non-blocking probe of the value queue: serves an item an earlier
    /// cycle already produced, if any.
    ///
    /// The outer `None` means the queue is empty right now; an inner `None`
    /// is the termination marker.
    pub async fn try_recv_value(&mut self) -> Result<Option<Option<WorkItem>>, RemoteError> {
        match self
            .round_trip(ClientRequest::RecvValue { wait: false })
            .await?
        {
            ServerReply::Value { item } => Ok(Some(item)),
            ServerReply::Empty => Ok(None),
            other => Err(RemoteError::UnexpectedReply(other)),
        }
    }

    async fn round_trip(&mut self, request: ClientRequest) -> Result<ServerReply, RemoteError> {
        self.writer.send(request).await?;
        match self.reader.next().await {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(RemoteError::Io(e)),
            None => Err(RemoteError::ConnectionClosed),
        }
    }
}
