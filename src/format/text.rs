//! Line-oriented text encoding.
//!
//! One line per record: the id, then each field, separated by tabs.
//! Backslash, tab, newline and carriage return inside fields are escaped.

use crate::io::{Buffer, Output, OutputQueue, Record};
use crate::Result;

fn escape_into(out: &mut Vec<u8>, field: &str) {
    for &b in field.as_bytes() {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\t' => out.extend_from_slice(b"\\t"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
}

/// Encode `records` as text lines.
pub fn encode_text(records: &[Record]) -> Vec<u8> {
    let mut out = Vec::with_capacity(records.len() * 32);
    for record in records {
        out.extend_from_slice(record.id.to_string().as_bytes());
        for field in &record.fields {
            out.push(b'\t');
            escape_into(&mut out, field);
        }
        out.push(b'\n');
    }
    out
}

/// Output for [`Encoding::TEXT`](crate::io::Encoding::TEXT).
///
/// Text is cheap to produce, so buffers are encoded on the caller's thread
/// and queued as ready payloads.
pub struct TextOutput {
    queue: OutputQueue,
    closed: bool,
}

impl TextOutput {
    pub fn new(queue: OutputQueue) -> Self {
        Self {
            queue,
            closed: false,
        }
    }
}

impl Output for TextOutput {
    fn handle_buffer(&mut self, buffer: Buffer) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        self.queue.push_ready(encode_text(buffer.records()))
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.queue.close()
    }
}
