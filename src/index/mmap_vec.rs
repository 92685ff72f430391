//! Growable vector stored in a memory mapping.

use std::fs::File;
use std::ops::{Index, IndexMut};

use super::mapping::{file_size, TypedMapping};
use super::value::EmptyValue;
use crate::{Error, Result};

/// Number of elements added on top of the requested size when a resize has
/// to grow the mapping.
pub const SIZE_INCREMENT: usize = 1024 * 1024;

/// A `Vec`-like array of `T` backed by an anonymous or file mapping.
///
/// Slots in `[len, capacity)` always hold `T::EMPTY` until written. Growing
/// the array may move the mapping, so raw pointers obtained earlier become
/// invalid. There is no internal locking: share it behind a lock.
///
/// # Example
///
/// ```ignore
/// use geostream::index::MmapVec;
///
/// let mut vec = MmapVec::<u64>::anonymous(16)?;
/// vec.push(7)?;
/// assert_eq!(vec.get(0)?, 7);
/// ```
pub struct MmapVec<T: EmptyValue> {
    size: usize,
    mapping: TypedMapping<T>,
}

impl<T: EmptyValue> MmapVec<T> {
    /// Create an anonymous array with the default capacity.
    pub fn new() -> Result<Self> {
        Self::anonymous(SIZE_INCREMENT)
    }

    /// Create an anonymous array with room for `capacity` elements.
    pub fn anonymous(capacity: usize) -> Result<Self> {
        let mut mapping = TypedMapping::anonymous(capacity)?;
        mapping.as_mut_slice().fill(T::EMPTY);
        Ok(Self { size: 0, mapping })
    }

    /// Create an array over `file` with `capacity` slots, `size` of them in use.
    ///
    /// Slots from `size` on are reset to `T::EMPTY`, then trailing empty
    /// slots are trimmed so the size reflects what was actually stored.
    pub fn with_file(file: File, capacity: usize, size: usize) -> Result<Self> {
        assert!(size <= capacity, "size {} exceeds capacity {}", size, capacity);
        let mut mapping = TypedMapping::file(capacity, file)?;
        mapping.as_mut_slice()[size..].fill(T::EMPTY);
        let mut vec = Self { size, mapping };
        vec.shrink_to_fit();
        Ok(vec)
    }

    /// Reopen an array previously persisted to `file`.
    pub fn from_file(file: File) -> Result<Self> {
        let size = file_size::<T>(&file)?;
        let capacity = size.max(SIZE_INCREMENT);
        log::debug!("Opening mapped array with {} stored elements", size);
        Self::with_file(file, capacity, size)
    }

    /// Number of mapped slots.
    pub fn capacity(&self) -> usize {
        self.mapping.len()
    }

    /// Number of elements in use.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Ensure at least `new_capacity` slots are mapped. Never shrinks.
    pub fn reserve(&mut self, new_capacity: usize) -> Result<()> {
        let old_capacity = self.capacity();
        if new_capacity > old_capacity {
            self.mapping.resize(new_capacity)?;
            self.mapping.as_mut_slice()[old_capacity..].fill(T::EMPTY);
        }
        Ok(())
    }

    /// Set the logical size, growing the mapping by an extra
    /// [`SIZE_INCREMENT`] when it is too small.
    ///
    /// Shrinking does not reset the dropped slots.
    pub fn resize(&mut self, new_size: usize) -> Result<()> {
        if new_size > self.capacity() {
            let new_capacity = new_size
                .checked_add(SIZE_INCREMENT)
                .ok_or_else(|| Error::Mapping(format!("capacity overflow for {} elements", new_size)))?;
            self.reserve(new_capacity)?;
        }
        self.size = new_size;
        Ok(())
    }

    /// Append `value` at the end.
    pub fn push(&mut self, value: T) -> Result<()> {
        self.resize(self.size + 1)?;
        let last = self.size - 1;
        self.mapping.as_mut_slice()[last] = value;
        Ok(())
    }

    /// Drop trailing empty slots from the logical size.
    pub fn shrink_to_fit(&mut self) {
        let data = self.mapping.as_slice();
        while self.size > 0 && data[self.size - 1] == T::EMPTY {
            self.size -= 1;
        }
    }

    /// Set the size to zero. Slot contents are left untouched.
    pub fn clear(&mut self) {
        self.size = 0;
    }

    /// Checked read of element `n`.
    pub fn get(&self, n: usize) -> Result<T> {
        if n >= self.size {
            return Err(Error::OutOfRange {
                index: n,
                size: self.size,
            });
        }
        Ok(self.mapping.as_slice()[n])
    }

    /// Elements in use.
    pub fn as_slice(&self) -> &[T] {
        &self.mapping.as_slice()[..self.size]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let size = self.size;
        &mut self.mapping.as_mut_slice()[..size]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Raw pointer to the first slot. Invalidated by any growth.
    pub fn as_ptr(&self) -> *const T {
        self.mapping.as_ptr()
    }

    /// Flush a file-backed array to disk.
    pub fn flush(&self) -> Result<()> {
        self.mapping.flush()
    }

    /// Unmap the storage now instead of on drop.
    pub fn close(&mut self) {
        self.mapping.unmap();
        self.size = 0;
    }
}

/// Unchecked in release builds beyond the mapped capacity; use
/// [`MmapVec::get`] for a checked read.
impl<T: EmptyValue> Index<usize> for MmapVec<T> {
    type Output = T;

    fn index(&self, n: usize) -> &T {
        debug_assert!(n < self.size, "index {} out of range (size {})", n, self.size);
        &self.mapping.as_slice()[n]
    }
}

impl<T: EmptyValue> IndexMut<usize> for MmapVec<T> {
    fn index_mut(&mut self, n: usize) -> &mut T {
        debug_assert!(n < self.size, "index {} out of range (size {})", n, self.size);
        &mut self.mapping.as_mut_slice()[n]
    }
}

impl<'a, T: EmptyValue> IntoIterator for &'a MmapVec<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Location;

    #[test]
    fn test_anonymous_starts_empty() {
        let vec = MmapVec::<u64>::anonymous(10).unwrap();
        assert_eq!(vec.capacity(), 10);
        assert_eq!(vec.len(), 0);
        assert!(vec.is_empty());
    }

    #[test]
    fn test_write_and_read_back() {
        let mut vec = MmapVec::<u64>::anonymous(10).unwrap();
        vec.resize(10).unwrap();
        vec[0] = 4;
        vec[3] = 9;
        vec[9] = 25;

        assert_eq!(vec[0], 4);
        assert_eq!(vec[3], 9);
        assert_eq!(vec[9], 25);
        assert_eq!(vec.get(9).unwrap(), 25);
        assert_eq!(vec.capacity(), 10);
    }

    #[test]
    fn test_resize_within_capacity_keeps_tail_empty() {
        let mut vec = MmapVec::<u64>::anonymous(10).unwrap();
        for n in 0..=10 {
            vec.resize(n).unwrap();
            assert_eq!(vec.len(), n);
            assert_eq!(vec.capacity(), 10);
        }

        vec.resize(4).unwrap();
        vec[0] = 1;
        vec[3] = 2;
        vec.resize(10).unwrap();
        assert!(vec.as_slice()[4..].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_resize_beyond_capacity_adds_increment() {
        let mut vec = MmapVec::<u32>::anonymous(8).unwrap();
        vec.resize(9).unwrap();
        assert_eq!(vec.len(), 9);
        assert_eq!(vec.capacity(), 9 + SIZE_INCREMENT);
        assert!(vec.as_slice().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_capacity_never_decreases() {
        let mut vec = MmapVec::<u64>::anonymous(100).unwrap();
        vec.reserve(50).unwrap();
        assert_eq!(vec.capacity(), 100);
        vec.resize(3).unwrap();
        assert_eq!(vec.capacity(), 100);
        vec.reserve(200).unwrap();
        assert_eq!(vec.capacity(), 200);
        vec.resize(1).unwrap();
        assert_eq!(vec.capacity(), 200);
    }

    #[test]
    fn test_push() {
        let mut vec = MmapVec::<u64>::anonymous(2).unwrap();
        vec.push(1).unwrap();
        vec.push(2).unwrap();
        vec.push(3).unwrap();

        assert_eq!(vec.len(), 3);
        assert_eq!(vec.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(vec.capacity() >= 3);
    }

    #[test]
    fn test_checked_access_out_of_range() {
        let mut vec = MmapVec::<u64>::anonymous(10).unwrap();
        vec.push(5).unwrap();

        assert_eq!(vec.get(0).unwrap(), 5);
        assert!(matches!(
            vec.get(1),
            Err(Error::OutOfRange { index: 1, size: 1 })
        ));
    }

    #[test]
    fn test_shrink_to_fit_is_idempotent() {
        let mut vec = MmapVec::<u64>::anonymous(10).unwrap();
        vec.resize(8).unwrap();
        vec[2] = 7;

        vec.shrink_to_fit();
        assert_eq!(vec.len(), 3);
        vec.shrink_to_fit();
        assert_eq!(vec.len(), 3);
    }

    #[test]
    fn test_location_values() {
        let mut vec = MmapVec::<Location>::anonymous(4).unwrap();
        vec.resize(4).unwrap();
        assert!(vec.iter().all(|loc| !loc.is_defined()));

        vec[1] = Location::new(10, 20);
        vec.shrink_to_fit();
        assert_eq!(vec.len(), 2);
    }

    #[test]
    fn test_file_backed_persists() {
        let file = tempfile::tempfile().unwrap();
        let reopen = file.try_clone().unwrap();

        {
            let mut vec = MmapVec::<u64>::with_file(file, 16, 0).unwrap();
            vec.push(11).unwrap();
            vec.push(22).unwrap();
            vec.push(33).unwrap();
            vec.flush().unwrap();
        }

        let vec = MmapVec::<u64>::from_file(reopen).unwrap();
        assert_eq!(vec.len(), 3);
        assert_eq!(vec.as_slice(), &[11, 22, 33]);
        assert_eq!(vec.capacity(), SIZE_INCREMENT);
    }

    #[test]
    fn test_with_file_resets_gap_and_trims() {
        let file = tempfile::tempfile().unwrap();
        let vec = MmapVec::<u64>::with_file(file, 32, 10).unwrap();
        assert_eq!(vec.len(), 0);
        assert_eq!(vec.capacity(), 32);
    }

    #[test]
    fn test_close() {
        let mut vec = MmapVec::<u64>::anonymous(10).unwrap();
        vec.push(1).unwrap();
        vec.close();
        assert_eq!(vec.capacity(), 0);
        assert!(vec.is_empty());
    }
}
