//! Chunked arena of immutable NUL-terminated strings.

use std::borrow::Borrow;
use std::cmp::Ordering;

/// Handle to a string held in a [`StringStore`].
///
/// Valid until the store is cleared or dropped. Compares by content.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StoredStr {
    ptr: *const u8,
    len: usize,
}

impl StoredStr {
    fn bytes(&self) -> &[u8] {
        // Safety: chunks never reallocate (writes stop at chunk capacity) and
        // handles are discarded before their store is cleared.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl PartialEq for StoredStr {
    fn eq(&self, other: &Self) -> bool {
        self.bytes() == other.bytes()
    }
}

impl Eq for StoredStr {}

impl PartialOrd for StoredStr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StoredStr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes().cmp(other.bytes())
    }
}

impl Borrow<[u8]> for StoredStr {
    fn borrow(&self) -> &[u8] {
        self.bytes()
    }
}

/// Storage for many small strings, allocated in fixed-size chunks.
///
/// A string is copied into the current chunk, NUL-terminated, and never
/// moves afterwards. When a string does not fit, a new chunk is started. No
/// string may be longer than a chunk. Memory is only released by
/// [`clear`](StringStore::clear) (all but one chunk) or on drop.
#[derive(Debug)]
pub struct StringStore {
    chunk_size: usize,
    /// Oldest first; writes go to the last chunk.
    chunks: Vec<Vec<u8>>,
}

impl StringStore {
    /// Create a store whose chunks hold `chunk_size` bytes.
    pub fn new(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self {
            chunk_size,
            chunks: vec![Vec::with_capacity(chunk_size)],
        }
    }

    /// Drop all chunks but the oldest and empty it.
    pub fn clear(&mut self) {
        self.chunks.truncate(1);
        self.chunks[0].clear();
    }

    pub(crate) fn push(&mut self, s: &str) -> StoredStr {
        let len = s.len() + 1;
        assert!(
            len <= self.chunk_size,
            "string of {} bytes does not fit into chunks of {} bytes",
            len,
            self.chunk_size
        );
        assert!(!s.as_bytes().contains(&0), "string contains a NUL byte");

        let needs_chunk = self
            .chunks
            .last()
            .map_or(true, |chunk| chunk.len() + len > self.chunk_size);
        if needs_chunk {
            self.chunks.push(Vec::with_capacity(self.chunk_size));
        }

        let last = self.chunks.len() - 1;
        let chunk = &mut self.chunks[last];
        let start = chunk.len();
        chunk.extend_from_slice(s.as_bytes());
        chunk.push(0);

        StoredStr {
            ptr: chunk[start..].as_ptr(),
            len: s.len(),
        }
    }

    /// Copy `s` into the store and return the stored copy.
    ///
    /// # Panics
    ///
    /// If `s` plus its terminator is longer than the chunk size, or if it
    /// contains a NUL byte.
    pub fn add(&mut self, s: &str) -> &str {
        let stored = self.push(s);
        // Safety: the bytes were copied from a `&str` into a chunk that lives
        // as long as the borrow of `self`.
        unsafe {
            std::str::from_utf8_unchecked(std::slice::from_raw_parts(stored.ptr, stored.len))
        }
    }

    /// Iterate over the stored strings in insertion order.
    pub fn iter(&self) -> Strings<'_> {
        let mut chunks = self.chunks.iter();
        let current = chunks.next().map(Vec::as_slice).unwrap_or_default();
        Strings { chunks, current }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(Vec::is_empty)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Bytes used in the chunk currently being written.
    pub fn used_bytes_in_last_chunk(&self) -> usize {
        self.chunks.last().map_or(0, Vec::len)
    }
}

impl<'a> IntoIterator for &'a StringStore {
    type Item = &'a str;
    type IntoIter = Strings<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the strings of a [`StringStore`], oldest chunk first.
#[derive(Debug, Clone)]
pub struct Strings<'a> {
    chunks: std::slice::Iter<'a, Vec<u8>>,
    current: &'a [u8],
}

impl<'a> Iterator for Strings<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            if let Some(end) = self.current.iter().position(|&b| b == 0) {
                let bytes = &self.current[..end];
                self.current = &self.current[end + 1..];
                // Safety: every string was copied from a `&str`.
                return Some(unsafe { std::str::from_utf8_unchecked(bytes) });
            }
            self.current = self.chunks.next()?.as_slice();
        }
    }
}

impl std::iter::FusedIterator for Strings<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store() {
        let store = StringStore::new(100);
        assert!(store.is_empty());
        assert_eq!(store.iter().count(), 0);
        assert_eq!(store.chunk_count(), 1);
    }

    #[test]
    fn test_add_and_iterate_in_order() {
        let mut store = StringStore::new(100);
        assert_eq!(store.add("foo"), "foo");
        assert_eq!(store.add("bar"), "bar");
        assert_eq!(store.add(""), "");
        assert_eq!(store.add("baz"), "baz");

        let strings: Vec<_> = store.iter().collect();
        assert_eq!(strings, vec!["foo", "bar", "", "baz"]);
        assert_eq!(store.used_bytes_in_last_chunk(), 4 + 4 + 1 + 4);
    }

    #[test]
    fn test_add_returns_stored_copy() {
        let mut store = StringStore::new(16);
        let input = String::from("tertiary");
        let stored = store.add(&input);
        assert_eq!(stored, "tertiary");
        assert_ne!(stored.as_ptr(), input.as_ptr());
    }

    #[test]
    fn test_new_chunk_when_full() {
        let mut store = StringStore::new(10);
        store.add("abcd"); // 5 bytes
        store.add("efgh"); // 10 bytes, chunk full
        assert_eq!(store.chunk_count(), 1);

        store.add("ij");
        assert_eq!(store.chunk_count(), 2);
        assert_eq!(store.used_bytes_in_last_chunk(), 3);

        let strings: Vec<_> = store.iter().collect();
        assert_eq!(strings, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_addresses_are_stable() {
        let mut store = StringStore::new(8);
        let first = store.push("abc");
        for i in 0..100 {
            store.add(&i.to_string());
        }
        assert_eq!(first.bytes(), b"abc");
        assert!(store.chunk_count() > 10);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let mut store = StringStore::new(6);
        for s in ["a", "bb", "ccc", "dddd"] {
            store.add(s);
        }
        let first: Vec<_> = store.iter().collect();
        let second: Vec<_> = (&store).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["a", "bb", "ccc", "dddd"]);
    }

    #[test]
    fn test_clear_keeps_one_chunk() {
        let mut store = StringStore::new(4);
        store.add("abc");
        store.add("def");
        store.add("ghi");
        assert_eq!(store.chunk_count(), 3);

        store.clear();
        assert_eq!(store.chunk_count(), 1);
        assert!(store.is_empty());

        store.add("x");
        assert_eq!(store.iter().collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn test_exact_fit() {
        let mut store = StringStore::new(4);
        store.add("abc");
        assert_eq!(store.chunk_count(), 1);
        assert_eq!(store.used_bytes_in_last_chunk(), 4);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_oversized_string_panics() {
        let mut store = StringStore::new(4);
        store.add("abcd");
    }
}
