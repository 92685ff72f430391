//! Dense id→value index stored in a mapped array.

use std::fs::File;

use super::mmap_vec::MmapVec;
use super::value::EmptyValue;
use crate::{Error, Result};

/// Maps integer ids to values by using the id as the array position.
///
/// Suited to id spaces that are densely populated, such as node ids of a
/// planet extract mapped to their locations. Unset ids read as
/// [`Error::NotFound`].
pub struct DenseIndex<T: EmptyValue> {
    vec: MmapVec<T>,
}

impl<T: EmptyValue> DenseIndex<T> {
    /// Create an index in anonymous memory.
    pub fn new() -> Result<Self> {
        Ok(Self {
            vec: MmapVec::new()?,
        })
    }

    /// Create or reopen an index persisted in `file`.
    pub fn with_file(file: File) -> Result<Self> {
        Ok(Self {
            vec: MmapVec::from_file(file)?,
        })
    }

    fn position(id: u64) -> Result<usize> {
        usize::try_from(id).map_err(|_| Error::NotFound(id))
    }

    /// Store `value` for `id`, growing the index as needed.
    pub fn set(&mut self, id: u64, value: T) -> Result<()> {
        let pos = Self::position(id)?;
        if pos >= self.vec.len() {
            let size = pos
                .checked_add(1)
                .ok_or_else(|| Error::Mapping(format!("id {} exceeds the index size limit", id)))?;
            self.vec.resize(size)?;
        }
        self.vec[pos] = value;
        Ok(())
    }

    /// Look up the value stored for `id`.
    pub fn get(&self, id: u64) -> Result<T> {
        let pos = Self::position(id)?;
        match self.vec.get(pos) {
            Ok(value) if value != T::EMPTY => Ok(value),
            _ => Err(Error::NotFound(id)),
        }
    }

    /// One past the highest id stored.
    pub fn size(&self) -> usize {
        self.vec.len()
    }

    /// Bytes of mapped memory held by the index.
    pub fn used_memory(&self) -> usize {
        self.vec.capacity() * std::mem::size_of::<T>()
    }

    /// Forget all ids.
    pub fn clear(&mut self) {
        self.vec.as_mut_slice().fill(T::EMPTY);
        self.vec.clear();
    }

    /// Flush a file-backed index to disk.
    pub fn flush(&self) -> Result<()> {
        self.vec.flush()
    }
}
