//! Ordered queue of encoded payloads between outputs and the file writer.
//!
//! Each queued item is either bytes that are already available or a handle
//! to bytes still being encoded on the worker pool. The consumer waits for
//! items in the order they were queued, so output order follows submission
//! order no matter which encode finishes first.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::{Error, Result};

fn panic_message(cause: &(dyn Any + Send)) -> String {
    let detail = cause
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| cause.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    format!("encoder panicked: {}", detail)
}

/// Bytes for the output file, possibly still being produced.
#[derive(Debug)]
pub enum Payload {
    /// Bytes available now.
    Ready(Vec<u8>),
    /// Bytes produced by a task that will send exactly one result.
    Pending(Receiver<Result<Vec<u8>>>),
}

impl Payload {
    /// Run `encode` on the rayon pool and return a handle to its result.
    pub fn spawn<F>(encode: F) -> Self
    where
        F: FnOnce() -> Result<Vec<u8>> + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        rayon::spawn(move || {
            // A panic escaping a rayon task aborts the process.
            let result = panic::catch_unwind(AssertUnwindSafe(encode))
                .unwrap_or_else(|cause| Err(Error::Encode(panic_message(cause.as_ref()))));
            // The receiver is gone if the writer gave up; nothing to report.
            let _ = tx.send(result);
        });
        Payload::Pending(rx)
    }

    /// Block until the bytes are available.
    pub fn wait(self) -> Result<Vec<u8>> {
        match self {
            Payload::Ready(data) => Ok(data),
            Payload::Pending(rx) => rx
                .recv()
                .map_err(|_| Error::Encode("encoder task ended without a result".to_string()))?,
        }
    }
}

/// Item travelling through the output queue.
#[derive(Debug)]
pub enum QueueItem {
    Data(Payload),
    /// No more items follow.
    EndOfStream,
}

/// Producer side of the output queue, held by an [`Output`](crate::io::Output).
///
/// The queue is bounded: pushing blocks while it is full, which throttles
/// producers to the speed of the disk.
#[derive(Debug, Clone)]
pub struct OutputQueue {
    sender: Sender<QueueItem>,
}

impl OutputQueue {
    /// Create a queue holding at most `capacity` items.
    pub fn bounded(capacity: usize) -> (OutputQueue, Receiver<QueueItem>) {
        let (sender, receiver) = bounded(capacity);
        (OutputQueue { sender }, receiver)
    }

    fn send(&self, item: QueueItem) -> Result<()> {
        self.sender.send(item).map_err(|_| Error::QueueClosed)
    }

    /// Queue a payload behind everything queued before.
    pub fn push(&self, payload: Payload) -> Result<()> {
        self.send(QueueItem::Data(payload))
    }

    /// Queue bytes that are already encoded.
    pub fn push_ready(&self, data: Vec<u8>) -> Result<()> {
        self.push(Payload::Ready(data))
    }

    /// Queue the end-of-stream marker.
    pub fn close(&self) -> Result<()> {
        self.send(QueueItem::EndOfStream)
    }

    /// Number of items waiting.
    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}
