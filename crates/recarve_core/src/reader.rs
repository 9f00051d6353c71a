//! Sequential block reader with an explicit absolute cursor.

use crate::error::{CoreError, Result};
use crate::traits::BlockSource;

pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Reads a [`BlockSource`] one fixed-size block at a time.
///
/// The reader never drops or duplicates a byte on its own: each `read`
/// returns the bytes at `[position, position + block_size)` and advances the
/// cursor by exactly the number of bytes returned. Only `seek_absolute`
/// moves the cursor backwards.
pub struct BlockReader<'s, S: BlockSource + ?Sized> {
    source: &'s mut S,
    buffer: Vec<u8>,
    position: u64,
}

impl<'s, S: BlockSource + ?Sized> BlockReader<'s, S> {
    pub fn new(source: &'s mut S, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(CoreError::InvalidConfig("block size must be non-zero".into()));
        }
        Ok(Self {
            source,
            buffer: vec![0u8; block_size],
            position: 0,
        })
    }

    /// Reads the next block. An empty slice means the source is exhausted.
    ///
    /// Short reads from the source are retried until the block is full or
    /// the source reports end of data, so only the final block of a source
    /// can be shorter than the block size.
    pub fn read(&mut self) -> Result<&[u8]> {
        let mut filled = 0;
        while filled < self.buffer.len() {
            let n = self
                .source
                .read_chunk(self.position + filled as u64, &mut self.buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        self.position += filled as u64;
        Ok(&self.buffer[..filled])
    }

    pub fn seek_absolute(&mut self, offset: u64) {
        self.position = offset;
    }

    #[inline]
    pub fn rewind(&mut self) {
        self.seek_absolute(0);
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    #[must_use]
    pub fn source_size(&self) -> u64 {
        self.source.size()
    }
}
