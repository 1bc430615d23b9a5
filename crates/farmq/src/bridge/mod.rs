//! Wire layer between clients and the queue server.
//!
//! Framing is a 4-byte length prefix + JSON. The message set mirrors the two
//! operations the server's channel pair exposes: put a token on the signal
//! queue, take an item off the value queue.

pub mod codec;
pub mod protocol;
pub mod remote;
