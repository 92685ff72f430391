//! Built-in output encodings.
//!
//! - [`Encoding::TEXT`]: one tab-separated line per record, see [`TextOutput`].
//! - [`Encoding::BLOCK`]: framed binary blocks with a per-block string table,
//!   see [`BlockOutput`] and [`BlockReader`].
//!
//! # Block File Structure
//!
//! ```text
//! +------------------+
//! |   HEADER FRAME   |  magic, version, header options
//! +------------------+
//! |   DATA FRAME     |  string table + records
//! +------------------+
//! |       ...        |
//! +------------------+
//! ```

mod block;
mod options;
mod text;
pub mod varint;


pub use block::{
    decode_block, encode_block, encode_header, BlockOutput, BlockReader, FrameFlags, FrameKind,
    FORMAT_VERSION, FRAME_PREFIX_SIZE, MAGIC,
};
pub use options::{BlockOptions, Compression, DEFAULT_LEVEL, DEFAULT_RECORDS_PER_BLOCK};
pub use text::{encode_text, TextOutput};

use crate::io::{Encoding, Output, OutputFactory, OutputFile, OutputQueue};
use crate::Result;

/// Largest uncompressed frame, and the default string table capacity.
pub const MAX_UNCOMPRESSED_BLOCK_SIZE: u32 = 32 * 1024 * 1024;

fn create_text_output(_file: &OutputFile, queue: OutputQueue) -> Result<Box<dyn Output>> {
    Ok(Box::new(TextOutput::new(queue)))
}

/// Register the block encoding with `options`.
///
/// Fails with [`Error::Config`](crate::Error::Config) if `options` do not
/// validate; otherwise returns `false` if [`Encoding::BLOCK`] is already
/// registered.
pub fn register_block(factory: &OutputFactory, options: BlockOptions) -> Result<bool> {
    options.validate()?;
    Ok(register_block_output(factory, options))
}

fn register_block_output(factory: &OutputFactory, options: BlockOptions) -> bool {
    factory.register(
        &[Encoding::BLOCK],
        move |_file: &OutputFile, queue: OutputQueue| -> Result<Box<dyn Output>> {
            Ok(Box::new(BlockOutput::new(queue, options.clone())?))
        },
    )
}

/// Register the text encoding.
pub fn register_text(factory: &OutputFactory) -> bool {
    factory.register(&[Encoding::TEXT], create_text_output)
}

/// Register both built-in encodings with default options.
pub fn register_defaults(factory: &OutputFactory) {
    register_block_output(factory, BlockOptions::default());
    register_text(factory);
}
