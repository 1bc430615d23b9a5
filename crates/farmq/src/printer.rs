//! Output serialization: many workers, one writer.
//!
//! Workers never print directly. Each print call becomes a [`PrintRecord`] on
//! a shared queue; a dedicated consumer task materializes records one at a
//! time, in enqueue order, so output from concurrent workers never
//! interleaves.

use std::io::Write;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One intended output action: the parts of a line plus how to join and
/// terminate them.
///
/// The default-empty record is reserved as the serializer's stop signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintRecord {
    pub parts: Vec<String>,
    /// Separator between parts; a single space when unset.
    pub sep: Option<String>,
    /// Line terminator; a newline when unset.
    pub end: Option<String>,
}

impl PrintRecord {
    pub fn line(text: impl Into<String>) -> Self {
        Self {
            parts: vec![text.into()],
            ..Self::default()
        }
    }

    pub fn from_parts(parts: Vec<String>) -> Self {
        Self {
            parts,
            ..Self::default()
        }
    }

    /// The reserved stop signal.
    pub fn stop() -> Self {
        Self::default()
    }

    pub fn is_stop(&self) -> bool {
        *self == Self::default()
    }

    fn materialize(&self) -> String {
        let sep = self.sep.as_deref().unwrap_or(" ");
        let end = self.end.as_deref().unwrap_or("\n");
        format!("{}{}", self.parts.join(sep), end)
    }
}

/// Forwarding handle given to workloads instead of direct output access.
///
/// Cheap to clone; enqueues records rather than writing. Records enqueued
/// after the serializer has stopped are dropped (documented loss, not an
/// error of the wider system).
#[derive(Clone)]
pub struct Printer {
    tx: mpsc::UnboundedSender<PrintRecord>,
}

impl Printer {
    pub fn print(&self, record: PrintRecord) {
        if self.tx.send(record).is_err() {
            tracing::warn!("output serializer is gone; dropping print record");
        }
    }

    pub fn line(&self, text: impl Into<String>) {
        self.print(PrintRecord::line(text));
    }
}

/// Dedicated consumer draining the shared output queue.
pub struct OutputSerializer {
    printer: Printer,
    handle: JoinHandle<()>,
}

impl OutputSerializer {
    /// Spawn the consumer over `sink`. Each record is written and flushed as
    /// one atomic unit, in strict enqueue order.
    pub fn spawn<W: Write + Send + 'static>(mut sink: W) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PrintRecord>();

        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if record.is_stop() {
                    tracing::debug!("output serializer stopping");
                    break;
                }

                let rendered = record.materialize();
                let result = sink
                    .write_all(rendered.as_bytes())
                    .and_then(|_| sink.flush());
                if let Err(e) = result {
                    // Non-fatal to the session: stop consuming. Records
                    // enqueued from here on are lost.
                    tracing::warn!(error = %e, "output sink failed, serializer stopping");
                    break;
                }
            }
        });

        Self {
            printer: Printer { tx },
            handle,
        }
    }

    pub fn printer(&self) -> Printer {
        self.printer.clone()
    }

    /// Send the stop record and wait for the consumer to exit.
    pub async fn shutdown(self) {
        self.printer.print(PrintRecord::stop());
        drop(self.printer);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "output serializer task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl SharedSink {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8(bytes.clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn record_materializes_with_defaults() {
        let record = PrintRecord::from_parts(vec!["a".into(), "b".into()]);
        assert_eq!(record.materialize(), "a b\n");
    }

    #[test]
    fn record_honors_sep_and_end() {
        let record = PrintRecord {
            parts: vec!["x".into(), "y".into()],
            sep: Some("::".into()),
            end: Some(" $".into()),
        };
        assert_eq!(record.materialize(), "x::y $");
    }

    #[test]
    fn empty_record_is_the_stop_signal() {
        assert!(PrintRecord::stop().is_stop());
        assert!(!PrintRecord::line("text").is_stop());
    }

    #[tokio::test]
    async fn records_come_out_in_enqueue_order() {
        let sink = SharedSink::default();
        let serializer = OutputSerializer::spawn(sink.clone());
        let printer = serializer.printer();

        for i in 0..10 {
            printer.line(format!("line {i}"));
        }
        serializer.shutdown().await;

        let expected: Vec<String> = (0..10).map(|i| format!("line {i}")).collect();
        assert_eq!(sink.lines(), expected);
    }

    #[tokio::test]
    async fn records_after_shutdown_are_dropped() {
        let sink = SharedSink::default();
        let serializer = OutputSerializer::spawn(sink.clone());
        let printer = serializer.printer();

        printer.line("before");
        serializer.shutdown().await;
        printer.line("after");

        assert_eq!(sink.lines(), vec!["before".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_producers_never_interleave() {
        let sink = SharedSink::default();
        let serializer = OutputSerializer::spawn(sink.clone());

        let mut producers = Vec::new();
        for tag in 0..3 {
            let printer = serializer.printer();
            producers.push(tokio::spawn(async move {
                for seq in 0..100 {
                    printer.print(PrintRecord::from_parts(vec![
                        format!("tag={tag}"),
                        format!("seq={seq}"),
                    ]));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }
        serializer.shutdown().await;

        let lines = sink.lines();
        assert_eq!(lines.len(), 300);

        // Every line is exactly one whole record, and each producer's
        // records appear in its own enqueue order.
        let mut next_seq = [0u32; 3];
        for line in lines {
            let (tag_part, seq_part) = line.split_once(' ').unwrap();
            let tag: usize = tag_part.strip_prefix("tag=").unwrap().parse().unwrap();
            let seq: u32 = seq_part.strip_prefix("seq=").unwrap().parse().unwrap();
            assert_eq!(seq, next_seq[tag]);
            next_seq[tag] += 1;
        }
        assert_eq!(next_seq, [100, 100, 100]);
    }
}
