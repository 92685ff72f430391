//! String deduplication for compact encodings.
//!
//! [`StringStore`] keeps many small strings in a few large chunks, and
//! [`StringTable`] interns strings on top of it, handing out dense ids that
//! a block encoder writes instead of the repeated text.

mod store;
mod table;

pub use store::{StringStore, Strings};
pub use table::{StringTable, DEFAULT_CHUNK_SIZE, MAX_ENTRIES};
