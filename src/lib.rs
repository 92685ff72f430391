//! geostream - building blocks for streaming large geodata sets to disk.
//!
//! This crate provides the storage and output plumbing a map data
//! processor needs when its data does not fit comfortably in memory, and
//! when encoding output must not stall the main pass.
//!
//! # Features
//!
//! - **Memory-mapped arrays**: [`MmapVec`] grows in place, anonymous or
//!   backed by a file that persists between runs
//! - **Dense indexes**: [`DenseIndex`] maps object ids to values such as
//!   [`Location`]s on top of an `MmapVec`
//! - **String interning**: [`StringTable`] assigns stable, dense ids to
//!   strings stored in large, never-moving chunks
//! - **Ordered asynchronous output**: [`Writer`] encodes buffers on a thread
//!   pool and writes them from a dedicated thread, in submission order
//! - **Pluggable encodings**: [`OutputFactory`] maps an [`Encoding`] to its
//!   encoder; text and a compressed block format are built in
//!
//! # Quick Start
//!
//! ```ignore
//! use geostream::{Buffer, Encoding, Header, OutputFactory, OutputFile, Record, Writer, WriterConfig};
//!
//! let factory = OutputFactory::with_defaults();
//! let file = OutputFile::new("ways.blk", Encoding::BLOCK);
//! let header = Header::new().with("generator", "geostream");
//! let mut writer = Writer::with_config(file, &header, &factory, &WriterConfig::default())?;
//!
//! for chunk in input.chunks(8000) {
//!     let buffer: Buffer = chunk.iter().map(|w| Record::new(w.id, w.tags())).collect();
//!     writer.write(buffer)?;
//! }
//! writer.close()?;
//! ```
//!
//! # Out-of-core Storage
//!
//! ```ignore
//! use geostream::{DenseIndex, Location};
//!
//! let file = std::fs::OpenOptions::new().read(true).write(true).create(true).open("nodes.idx")?;
//! let mut locations = DenseIndex::<Location>::with_file(file)?;
//! locations.set(17, Location::from_degrees(13.4, 52.5))?;
//! assert!(locations.get(17)?.is_defined());
//! ```

mod error;

pub mod format;
pub mod index;
pub mod io;
pub mod strings;

// Re-export core types
pub use error::{Error, Result};

// Re-export storage types
pub use index::{DenseIndex, EmptyValue, Location, MmapVec};
pub use strings::{StringStore, StringTable};

// Re-export output pipeline types
pub use format::{BlockOptions, BlockReader, Compression};
pub use io::{Buffer, Encoding, Header, Output, OutputFactory, OutputFile, Record, Writer, WriterConfig};
