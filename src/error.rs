//! Error types for geostream.

use thiserror::Error;

/// Error type for geostream operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Checked access beyond the logical size of an array
    #[error("index {index} out of range (size {size})")]
    OutOfRange { index: usize, size: usize },

    /// No output constructor registered for the requested encoding
    #[error("encoding not supported: {0}")]
    EncodingNotSupported(String),

    /// String table would exceed its entry cap
    #[error("string table has too many entries (max {max})")]
    TableOverflow { max: u32 },

    /// Memory mapping could not be created or resized
    #[error("mapping error: {0}")]
    Mapping(String),

    /// Unrecoverable failure writing to the destination
    #[error("write error: {0}")]
    Write(std::io::Error),

    /// Id not present in a dense index
    #[error("id {0} not found in index")]
    NotFound(u64),

    /// Output queue has no consumer any more
    #[error("output queue closed")]
    QueueClosed,

    /// Asynchronous encoding did not produce a result
    #[error("encode error: {0}")]
    Encode(String),

    /// Buffer submitted to a writer that was already closed
    #[error("writer already closed")]
    WriterClosed,

    /// Invalid block file magic bytes
    #[error("invalid magic bytes: expected GEOBLK header")]
    InvalidMagic,

    /// Unsupported block format version
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u32),

    /// Malformed block data
    #[error("decode error: {0}")]
    Decode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for geostream operations.
pub type Result<T> = std::result::Result<T, Error>;
