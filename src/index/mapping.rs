//! Typed memory mappings, anonymous or backed by a file.
//!
//! All sizes in this module are counted in elements of `T`, not bytes.

use memmap2::{MmapMut, MmapOptions};
use std::fs::File;
use std::marker::PhantomData;
use std::mem;

use crate::{Error, Result};

/// Byte length for `capacity` elements of `T`, rejecting empty and oversized requests.
fn byte_len<T>(capacity: usize) -> Result<usize> {
    if capacity == 0 {
        return Err(Error::Mapping("cannot map zero elements".to_string()));
    }
    capacity
        .checked_mul(mem::size_of::<T>())
        .filter(|&bytes| bytes <= isize::MAX as usize)
        .ok_or_else(|| {
            Error::Mapping(format!(
                "mapping of {} elements exceeds platform limits",
                capacity
            ))
        })
}

fn map_anon(bytes: usize) -> Result<MmapMut> {
    MmapOptions::new()
        .len(bytes)
        .map_anon()
        .map_err(|e| Error::Mapping(format!("anonymous mapping of {} bytes failed: {}", bytes, e)))
}

fn map_file(bytes: usize, file: &File) -> Result<MmapMut> {
    // Safety: the mapping is owned by a single TypedMapping and the file is
    // not truncated while it is mapped.
    unsafe { MmapOptions::new().len(bytes).map_mut(file) }
        .map_err(|e| Error::Mapping(format!("file mapping of {} bytes failed: {}", bytes, e)))
}

#[cfg(target_os = "linux")]
fn remap_anon(mmap: &mut MmapMut, bytes: usize) -> Result<()> {
    // Safety: callers hold no references into the old mapping.
    unsafe { mmap.remap(bytes, memmap2::RemapOptions::new().may_move(true)) }
        .map_err(|e| Error::Mapping(format!("remap to {} bytes failed: {}", bytes, e)))
}

#[cfg(not(target_os = "linux"))]
fn remap_anon(mmap: &mut MmapMut, bytes: usize) -> Result<()> {
    let mut moved = map_anon(bytes)?;
    let keep = bytes.min(mmap.len());
    moved[..keep].copy_from_slice(&mmap[..keep]);
    *mmap = moved;
    Ok(())
}

/// Size of a file in elements of `T`.
pub fn file_size<T>(file: &File) -> Result<usize> {
    let bytes = file.metadata()?.len() as usize;
    Ok(bytes / mem::size_of::<T>())
}

/// Grow `file` to hold at least `new_size` elements of `T`.
///
/// Never shrinks the file.
pub fn grow_file<T>(new_size: usize, file: &File) -> Result<()> {
    if file_size::<T>(file)? < new_size {
        let bytes = new_size
            .checked_mul(mem::size_of::<T>())
            .ok_or_else(|| Error::Mapping(format!("file size of {} elements overflows", new_size)))?;
        file.set_len(bytes as u64)?;
    }
    Ok(())
}

/// Anonymous mapping with room for `capacity` elements of `T`.
pub fn map<T: Copy>(capacity: usize) -> Result<TypedMapping<T>> {
    TypedMapping::anonymous(capacity)
}

/// A memory mapping viewed as a slice of `T`.
///
/// The mapping is exclusively owned; resizing may move it, so pointers and
/// slices obtained before a resize must not be used afterwards.
pub struct TypedMapping<T> {
    mmap: Option<MmapMut>,
    file: Option<File>,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T: Copy> TypedMapping<T> {
    /// Map `capacity` elements of private anonymous memory.
    pub fn anonymous(capacity: usize) -> Result<Self> {
        let mmap = map_anon(byte_len::<T>(capacity)?)?;
        Ok(Self {
            mmap: Some(mmap),
            file: None,
            capacity,
            _marker: PhantomData,
        })
    }

    /// Map `capacity` elements of `file` shared, growing the file if needed.
    pub fn file(capacity: usize, file: File) -> Result<Self> {
        let bytes = byte_len::<T>(capacity)?;
        grow_file::<T>(capacity, &file)?;
        let mmap = map_file(bytes, &file)?;
        Ok(Self {
            mmap: Some(mmap),
            file: Some(file),
            capacity,
            _marker: PhantomData,
        })
    }

    /// Number of elements mapped (0 once unmapped).
    pub fn len(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.capacity == 0
    }

    /// Whether this mapping is backed by a file.
    pub fn is_file_backed(&self) -> bool {
        self.file.is_some()
    }

    /// Change the mapping to hold `new_capacity` elements.
    ///
    /// Existing contents up to the smaller of the two sizes are kept. The
    /// mapping may move.
    pub fn resize(&mut self, new_capacity: usize) -> Result<()> {
        if new_capacity == self.capacity {
            return Ok(());
        }
        let bytes = byte_len::<T>(new_capacity)?;

        if let Some(file) = &self.file {
            grow_file::<T>(new_capacity, file)?;
            // The old mapping shares the same pages, so nothing needs copying.
            self.mmap = Some(map_file(bytes, file)?);
        } else if let Some(mmap) = self.mmap.as_mut() {
            remap_anon(mmap, bytes)?;
        } else {
            self.mmap = Some(map_anon(bytes)?);
        }

        log::debug!(
            "Resized mapping from {} to {} elements",
            self.capacity,
            new_capacity
        );
        self.capacity = new_capacity;
        Ok(())
    }

    /// Release the mapping. The backing file, if any, stays open.
    pub fn unmap(&mut self) {
        self.mmap = None;
        self.capacity = 0;
    }

    /// Flush changes of a file-backed mapping to disk.
    pub fn flush(&self) -> Result<()> {
        if let (Some(mmap), Some(_)) = (&self.mmap, &self.file) {
            mmap.flush()?;
        }
        Ok(())
    }

    pub fn as_ptr(&self) -> *const T {
        match &self.mmap {
            Some(mmap) => mmap.as_ptr() as *const T,
            None => std::ptr::NonNull::dangling().as_ptr(),
        }
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        match &mut self.mmap {
            Some(mmap) => mmap.as_mut_ptr() as *mut T,
            None => std::ptr::NonNull::dangling().as_ptr(),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        // Safety: mappings are page aligned and exactly `capacity` elements long.
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.capacity) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let capacity = self.capacity;
        // Safety: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr(), capacity) }
    }
}
