//! Core traits defining the interface for raw byte sources.
//!
//! The carving engine only ever talks to a [`BlockSource`]; the concrete
//! device, image or memory-mapped readers live in `recarve_io`.

use crate::error::Result;

/// A source of raw block data, typically a disk or image file.
///
/// This trait abstracts away the underlying storage medium, allowing
/// the same carving logic to work on physical disks, disk images,
/// or in-memory buffers.
///
/// # Example
///
/// ```ignore
/// struct DiskDevice { /* ... */ }
///
/// impl BlockSource for DiskDevice {
///     fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
///         // Read from physical disk at offset
///     }
///
///     fn size(&self) -> u64 {
///         // Return total size in bytes
///     }
/// }
/// ```
pub trait BlockSource {
    /// Reads a chunk of data from the source at the specified offset.
    ///
    /// Returns the number of bytes actually read, which may be less than
    /// `buffer.len()`. Zero means the offset is at or past the end.
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize>;

    /// Returns the total size of the source in bytes.
    fn size(&self) -> u64;
}

fn copy_from_slice(data: &[u8], offset: u64, buffer: &mut [u8]) -> usize {
    let Ok(start) = usize::try_from(offset) else {
        return 0;
    };
    if start >= data.len() {
        return 0;
    }
    let len = buffer.len().min(data.len() - start);
    buffer[..len].copy_from_slice(&data[start..start + len]);
    len
}

impl BlockSource for Vec<u8> {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        Ok(copy_from_slice(self, offset, buffer))
    }

    #[inline]
    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl BlockSource for &[u8] {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        Ok(copy_from_slice(self, offset, buffer))
    }

    #[inline]
    fn size(&self) -> u64 {
        self.len() as u64
    }
}
