//! Output encoders and the registry that creates them.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::buffer::Buffer;
use super::file::{Encoding, OutputFile};
use super::header::Header;
use super::queue::OutputQueue;
use crate::{Error, Result};

/// Encoder for one wire format.
///
/// An output turns buffers into bytes and pushes them, in order, onto the
/// queue it was created with. It never writes to the file itself; the
/// writer's output thread does that.
pub trait Output: Send {
    /// Encode the file header. Called once, before any buffer.
    fn set_header(&mut self, _header: &Header) -> Result<()> {
        Ok(())
    }

    /// Encode `buffer` and queue the result.
    fn handle_buffer(&mut self, buffer: Buffer) -> Result<()>;

    /// Queue the end-of-stream marker. Further calls must be no-ops.
    fn close(&mut self) -> Result<()>;
}

/// Constructor registered for an encoding.
pub type CreateOutput =
    Arc<dyn Fn(&OutputFile, OutputQueue) -> Result<Box<dyn Output>> + Send + Sync>;

/// Registry of output constructors keyed by [`Encoding`].
///
/// Owned by the application and shared by reference or `Arc`; registration
/// is safe from any thread.
pub struct OutputFactory {
    constructors: RwLock<HashMap<Encoding, CreateOutput>>,
}

impl OutputFactory {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// A registry with the built-in text and block encodings.
    pub fn with_defaults() -> Self {
        let factory = Self::new();
        crate::format::register_defaults(&factory);
        factory
    }

    /// Register `create` for each of `encodings`.
    ///
    /// Returns `false` and registers nothing if any encoding already has a
    /// constructor.
    pub fn register<F>(&self, encodings: &[Encoding], create: F) -> bool
    where
        F: Fn(&OutputFile, OutputQueue) -> Result<Box<dyn Output>> + Send + Sync + 'static,
    {
        let mut constructors = self.constructors.write();
        if encodings.iter().any(|e| constructors.contains_key(e)) {
            return false;
        }

        let create: CreateOutput = Arc::new(create);
        for encoding in encodings {
            constructors.insert(encoding.clone(), Arc::clone(&create));
            log::debug!("Registered output encoding {}", encoding);
        }
        true
    }

    /// Remove the constructor for `encoding`. Returns whether one existed.
    pub fn unregister(&self, encoding: &Encoding) -> bool {
        self.constructors.write().remove(encoding).is_some()
    }

    pub fn is_registered(&self, encoding: &Encoding) -> bool {
        self.constructors.read().contains_key(encoding)
    }

    /// Registered encodings, sorted by name.
    pub fn encodings(&self) -> Vec<Encoding> {
        let mut encodings: Vec<_> = self.constructors.read().keys().cloned().collect();
        encodings.sort();
        encodings
    }

    /// Create the output for `file`'s encoding.
    pub fn create_output(&self, file: &OutputFile, queue: OutputQueue) -> Result<Box<dyn Output>> {
        // Clone the constructor so it runs without holding the lock.
        let create = self
            .constructors
            .read()
            .get(file.encoding())
            .cloned()
            .ok_or_else(|| Error::EncodingNotSupported(file.encoding().to_string()))?;
        create(file, queue)
    }
}

impl Default for OutputFactory {
    fn default() -> Self {
        Self::new()
    }
}
