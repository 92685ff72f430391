//! Writer facade and the output thread it drives.

use crossbeam_channel::Receiver;
use std::io::Write;
use std::thread::{self, JoinHandle};

use super::buffer::Buffer;
use super::config::WriterConfig;
use super::file::{OutputFile, Sink};
use super::header::Header;
use super::output::{Output, OutputFactory};
use super::queue::{OutputQueue, QueueItem};
use crate::{Error, Result};

/// Consumer loop of the output thread.
///
/// Takes payloads off the queue in FIFO order, waits for each to be encoded
/// and writes it out, until the end-of-stream marker arrives. The first
/// failure stops the loop; dropping the receiver then makes further pushes
/// fail with [`Error::QueueClosed`].
pub struct FileOutput {
    queue: Receiver<QueueItem>,
    sink: Sink,
}

impl FileOutput {
    pub fn new(queue: Receiver<QueueItem>, sink: Sink) -> Self {
        Self { queue, sink }
    }

    /// Run until end of stream. Returns the number of bytes written.
    pub fn run(mut self) -> Result<u64> {
        let result = self.drain();
        if let Err(e) = &result {
            log::error!("Output thread stopped: {}", e);
        }
        result
    }

    fn drain(&mut self) -> Result<u64> {
        let mut written = 0u64;
        loop {
            let item = match self.queue.recv() {
                Ok(item) => item,
                Err(_) => {
                    log::warn!("Output queue dropped without end-of-stream marker");
                    break;
                }
            };

            let payload = match item {
                QueueItem::Data(payload) => payload,
                QueueItem::EndOfStream => break,
            };

            let data = payload.wait()?;
            if data.is_empty() {
                continue;
            }
            // write_all retries interrupted and short writes.
            self.sink.write_all(&data).map_err(Error::Write)?;
            written += data.len() as u64;
            log::trace!("Wrote {} bytes ({} total)", data.len(), written);
        }

        self.sink.flush().map_err(Error::Write)?;
        Ok(written)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Writing,
    Closed,
    /// The output thread failed and its error has been reported.
    Failed,
}

/// Writes record buffers to a file in a given encoding.
///
/// Encoding happens on the caller's thread or the worker pool, depending on
/// the output; file writes happen on a dedicated output thread. Bytes reach
/// the file in the order buffers were submitted.
///
/// A failure on the output thread is returned by the next
/// [`write`](Writer::write) or by [`close`](Writer::close); payloads still
/// queued at that point are discarded.
///
/// # Example
///
/// ```ignore
/// use geostream::io::{Buffer, Encoding, OutputFactory, OutputFile, Record, Writer};
///
/// let factory = OutputFactory::with_defaults();
/// let file = OutputFile::new("ways.blk", Encoding::BLOCK);
/// let mut writer = Writer::new(file, &factory)?;
///
/// let mut buffer = Buffer::new();
/// buffer.push(Record::new(1, ["highway", "residential"]));
/// writer.write(buffer)?;
/// writer.close()?;
/// ```
pub struct Writer {
    file: OutputFile,
    output: Box<dyn Output>,
    consumer: Option<JoinHandle<Result<u64>>>,
    state: WriterState,
    bytes_written: u64,
}

impl Writer {
    /// Open `file` with an empty header and the default configuration.
    pub fn new(file: OutputFile, factory: &OutputFactory) -> Result<Self> {
        Self::with_config(file, &Header::default(), factory, &WriterConfig::default())
    }

    /// Open `file`, write `header`, and start the output thread.
    pub fn with_config(
        file: OutputFile,
        header: &Header,
        factory: &OutputFactory,
        config: &WriterConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (queue, receiver) = OutputQueue::bounded(config.queue_capacity);
        let output = factory.create_output(&file, queue)?;
        let sink = file.open_for_output()?;

        let consumer = FileOutput::new(receiver, sink);
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || consumer.run())?;

        let mut writer = Self {
            file,
            output,
            consumer: Some(handle),
            state: WriterState::Writing,
            bytes_written: 0,
        };
        // On failure, dropping the writer shuts the thread down.
        writer.output.set_header(header)?;

        log::debug!(
            "Writer started for {} ({})",
            writer
                .file
                .path()
                .map_or_else(|| "stdout".to_string(), |p| p.display().to_string()),
            writer.file.encoding()
        );
        Ok(writer)
    }

    pub fn file(&self) -> &OutputFile {
        &self.file
    }

    /// Bytes written by the output thread, known once it has finished.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Submit a buffer for encoding and writing.
    pub fn write(&mut self, buffer: Buffer) -> Result<()> {
        if self.state != WriterState::Writing {
            return Err(Error::WriterClosed);
        }
        if self.consumer.as_ref().is_some_and(|h| h.is_finished()) {
            return Err(self.consumer_failure());
        }

        match self.output.handle_buffer(buffer) {
            Err(Error::QueueClosed) => Err(self.consumer_failure()),
            result => result,
        }
    }

    /// Queue end of stream and wait for everything to be written.
    ///
    /// Returns the number of bytes written. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<u64> {
        match self.state {
            WriterState::Closed => return Ok(self.bytes_written),
            WriterState::Failed => return Err(Error::WriterClosed),
            WriterState::Writing => {}
        }
        self.state = WriterState::Closed;

        let closed = self.output.close();
        let joined = self.join();
        match (closed, joined) {
            (_, Err(e)) | (Err(e), Ok(_)) => {
                self.state = WriterState::Failed;
                Err(e)
            }
            (Ok(()), Ok(written)) => {
                self.bytes_written = written;
                log::debug!("Writer closed after {} bytes", written);
                Ok(written)
            }
        }
    }

    fn join(&mut self) -> Result<u64> {
        match self.consumer.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Encode("output thread panicked".to_string()))?,
            None => Ok(self.bytes_written),
        }
    }

    /// Collect the error that stopped the output thread early.
    fn consumer_failure(&mut self) -> Error {
        self.state = WriterState::Failed;
        match self.join() {
            Err(e) => e,
            Ok(_) => Error::QueueClosed,
        }
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if self.state == WriterState::Writing {
            if let Err(e) = self.close() {
                log::warn!("Error while closing writer on drop: {}", e);
            }
        }
    }
}
