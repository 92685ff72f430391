//! Asynchronous, order-preserving output pipeline.
//!
//! A [`Writer`] owns the destination file, an [`Output`] encoder chosen by
//! the file's [`Encoding`] through an [`OutputFactory`], and one output
//! thread running [`FileOutput`]:
//!
//! ```text
//! caller ──write(buffer)──▶ Output ──Payload──▶ OutputQueue ──▶ FileOutput ──▶ file
//!                             │                    (FIFO)        (waits for
//!                             └─ rayon encode tasks ─┘            each payload)
//! ```

mod buffer;
mod config;
mod file;
mod header;
mod output;
mod queue;
mod writer;

pub use buffer::{Buffer, Record};
pub use config::{WriterConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_THREAD_NAME};
pub use file::{Encoding, OutputFile, Sink};
pub use header::Header;
pub use output::{CreateOutput, Output, OutputFactory};
pub use queue::{OutputQueue, Payload, QueueItem};
pub use writer::{FileOutput, Writer};
