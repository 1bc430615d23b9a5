//! The server's channel pair: one signal queue, one value queue.
//!
//! Both queues are plain FIFOs. The signal queue carries content-free tokens
//! ("a client wants the next value"); the value queue carries produced items,
//! with `None` as the termination marker. Receivers sit behind a Mutex so any
//! connection handler may take the next item; each send/receive is the atomic
//! unit of coordination, there are no other locks in the data path.

use tokio::sync::{Mutex, mpsc};

use crate::bridge::protocol::WorkItem;

/// Paired signal and value queues, created once at server start.
///
/// The pair is an explicit handle: the input loop and every connection
/// handler receive a reference to the same instance, and tests can drive it
/// directly as an in-memory fake.
pub struct ChannelPair {
    signal_tx: mpsc::UnboundedSender<()>,
    signal_rx: Mutex<mpsc::UnboundedReceiver<()>>,
    value_tx: mpsc::UnboundedSender<Option<WorkItem>>,
    value_rx: Mutex<mpsc::UnboundedReceiver<Option<WorkItem>>>,
}

impl ChannelPair {
    pub fn new() -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (value_tx, value_rx) = mpsc::unbounded_channel();

        Self {
            signal_tx,
            signal_rx: Mutex::new(signal_rx),
            value_tx,
            value_rx: Mutex::new(value_rx),
        }
    }

    /// Queue one production request for the input loop.
    pub fn send_signal(&self) {
        // The pair owns the receiver, so the queue cannot be closed.
        let _ = self.signal_tx.send(());
    }

    /// Blocking receive on the signal queue (input-loop side).
    pub async fn recv_signal(&self) {
        let mut rx = self.signal_rx.lock().await;
        let _ = rx.recv().await;
    }

    /// Queue one produced item (or the termination marker) for delivery.
    pub fn send_value(&self, item: Option<WorkItem>) {
        let _ = self.value_tx.send(item);
    }

    /// Blocking receive on the value queue; any waiting consumer may win.
    pub async fn recv_value(&self) -> Option<WorkItem> {
        let mut rx = self.value_rx.lock().await;
        match rx.recv().await {
            Some(item) => item,
            // Unreachable: the pair holds a sender for its own queue.
            None => None,
        }
    }

    /// Non-blocking probe of the value queue.
    ///
    /// Reports empty (`None`) when the queue has no item right now or when
    /// another consumer currently holds the receiver.
    pub fn try_recv_value(&self) -> Option<Option<WorkItem>> {
        let mut rx = self.value_rx.try_lock().ok()?;
        rx.try_recv().ok()
    }
}

impl Default for ChannelPair {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn values_arrive_in_fifo_order() {
        let pair = ChannelPair::new();

        pair.send_value(Some(json!(1)));
        pair.send_value(Some(json!(2)));
        pair.send_value(None);

        assert_eq!(pair.recv_value().await, Some(json!(1)));
        assert_eq!(pair.recv_value().await, Some(json!(2)));
        assert_eq!(pair.recv_value().await, None);
    }

    #[tokio::test]
    async fn signals_pass_through() {
        let pair = ChannelPair::new();

        pair.send_signal();
        pair.send_signal();

        pair.recv_signal().await;
        pair.recv_signal().await;
    }

    #[tokio::test]
    async fn try_recv_reports_empty() {
        let pair = ChannelPair::new();
        assert_eq!(pair.try_recv_value(), None);

        pair.send_value(Some(json!("work")));
        assert_eq!(pair.try_recv_value(), Some(Some(json!("work"))));
        assert_eq!(pair.try_recv_value(), None);
    }

    #[tokio::test]
    async fn try_recv_surfaces_termination_marker() {
        let pair = ChannelPair::new();

        pair.send_value(None);
        assert_eq!(pair.try_recv_value(), Some(None));
    }
}
