//! Interning table mapping strings to dense ids.

use std::collections::BTreeMap;

use super::store::{StoredStr, StringStore, Strings};
use crate::format::MAX_UNCOMPRESSED_BLOCK_SIZE;
use crate::{Error, Result};

/// Chunk size of the backing store.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Maximum number of entries in a table. A block with more distinct strings
/// than this could never be encoded within [`MAX_UNCOMPRESSED_BLOCK_SIZE`].
pub const MAX_ENTRIES: u32 = MAX_UNCOMPRESSED_BLOCK_SIZE;

/// String table used while encoding one block.
///
/// Id 0 is the empty string, which is always present. Every other distinct
/// string gets the next id, starting at 1, in the order it was first added.
/// Iterating yields the strings in id order, so the table can be written
/// out in front of the records that refer to it.
#[derive(Debug)]
pub struct StringTable {
    strings: StringStore,
    index: BTreeMap<StoredStr, u32>,
    size: u32,
    max_entries: u32,
}

// Safety: the raw pointers in `index` point into `strings`, which is owned by
// the same table and moves with it.
unsafe impl Send for StringTable {}

impl StringTable {
    /// Create a table with the default chunk size and entry cap.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_CHUNK_SIZE, MAX_ENTRIES)
    }

    /// Create a table with a custom store chunk size and entry cap.
    pub fn with_limits(chunk_size: usize, max_entries: u32) -> Self {
        let mut strings = StringStore::new(chunk_size);
        strings.push("");
        Self {
            strings,
            index: BTreeMap::new(),
            size: 0,
            max_entries,
        }
    }

    /// Reset to only the empty string.
    pub fn clear(&mut self) {
        // The index must go first: its keys point into the store.
        self.index.clear();
        self.strings.clear();
        self.strings.push("");
        self.size = 0;
    }

    /// Intern `s` and return its id.
    ///
    /// The empty string always maps to id 0. Returns
    /// [`Error::TableOverflow`] if `s` is new and the table is full.
    pub fn add(&mut self, s: &str) -> Result<u32> {
        if s.is_empty() {
            return Ok(0);
        }
        if let Some(&id) = self.index.get(s.as_bytes()) {
            return Ok(id);
        }
        if self.size >= self.max_entries {
            return Err(Error::TableOverflow {
                max: self.max_entries,
            });
        }

        let stored = self.strings.push(s);
        self.size += 1;
        self.index.insert(stored, self.size);
        Ok(self.size)
    }

    /// Id of `s` if it has been added.
    pub fn get(&self, s: &str) -> Option<u32> {
        if s.is_empty() {
            return Some(0);
        }
        self.index.get(s.as_bytes()).copied()
    }

    /// Number of entries including the reserved empty string.
    pub fn len(&self) -> usize {
        self.size as usize + 1
    }

    /// Whether nothing beyond the reserved empty string has been added.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn max_entries(&self) -> u32 {
        self.max_entries
    }

    /// Strings in id order, starting with the empty string.
    pub fn iter(&self) -> Strings<'_> {
        self.strings.iter()
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a StringTable {
    type Item = &'a str;
    type IntoIter = Strings<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
