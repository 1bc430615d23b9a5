//! Wire messages between a client and the queue server.
//!
//! One request per reply, strictly paired, one in flight per connection.
//! The first request on a connection must be `Hello`; everything after maps
//! onto the server's channel pair.

use serde::{Deserialize, Serialize};

/// An opaque unit of work.
///
/// Produced by the server-side input source and consumed by client
/// workloads; the core never inspects it. `Option<WorkItem>` is used
/// wherever the stream can end: `None` is the termination marker, meaning
/// "no further work will be produced this call".
pub type WorkItem = serde_json::Value;

/// Requests from a client connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Authentication handshake; must be the first frame on a connection.
    Hello { authkey: String },

    /// Put one content-free token on the signal queue, requesting one unit
    /// of production.
    SendSignal,

    /// Take the next item off the value queue. With `wait: false` the server
    /// answers `Empty` instead of blocking.
    RecvValue { wait: bool },
}

/// Replies from the server, paired 1:1 with requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerReply {
    /// Handshake accepted.
    Welcome,

    /// Handshake rejected (wrong authkey or protocol violation); the server
    /// closes the connection after sending this.
    Denied,

    /// The signal token was queued for the input loop.
    SignalQueued,

    /// One item from the value queue. `item: None` is the termination marker.
    Value { item: Option<WorkItem> },

    /// Value queue is empty right now (only sent for `wait: false`).
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hello_wire_shape() {
        let value = serde_json::to_value(ClientRequest::Hello {
            authkey: "secret".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({"type": "hello", "authkey": "secret"}));
    }

    #[test]
    fn send_signal_wire_shape() {
        let value = serde_json::to_value(ClientRequest::SendSignal).unwrap();
        assert_eq!(value, json!({"type": "send_signal"}));
    }

    #[test]
    fn recv_value_wire_shape() {
        let value = serde_json::to_value(ClientRequest::RecvValue { wait: false }).unwrap();
        assert_eq!(value, json!({"type": "recv_value", "wait": false}));
    }

    #[test]
    fn value_reply_wire_shape() {
        let value = serde_json::to_value(ServerReply::Value {
            item: Some(json!(7)),
        })
        .unwrap();
        assert_eq!(value, json!({"type": "value", "item": 7}));
    }

    #[test]
    fn termination_marker_is_null_item() {
        let value = serde_json::to_value(ServerReply::Value { item: None }).unwrap();
        assert_eq!(value, json!({"type": "value", "item": null}));

        let parsed: ServerReply =
            serde_json::from_value(json!({"type": "value", "item": null})).unwrap();
        assert_eq!(parsed, ServerReply::Value { item: None });
    }
}
