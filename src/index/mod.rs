//! Out-of-core indexes built on memory mappings.
//!
//! [`MmapVec`] is a growable array whose storage is a memory mapping, either
//! anonymous (the OS pages it out under pressure) or shared with a file (the
//! contents persist without an explicit save). [`DenseIndex`] builds an
//! id→value map on top of it.
//!
//! None of these types lock internally; wrap them in a lock to share them
//! between threads.

mod dense;
pub mod mapping;
mod mmap_vec;
mod value;

pub use dense::DenseIndex;
pub use mapping::{file_size, grow_file, map, TypedMapping};
pub use mmap_vec::{MmapVec, SIZE_INCREMENT};
pub use value::{EmptyValue, Location, COORDINATE_PRECISION, UNDEFINED_COORDINATE};
