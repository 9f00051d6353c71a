use crate::open_error;
use recarve_core::{BlockSource, CoreError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;

/// Memory-mapped image file.
///
/// Block devices cannot be mapped this way; [`crate::Reader::open`] falls back
/// to [`crate::DiskReader`] for them.
pub struct MmapReader {
    mmap: Mmap,
    size: u64,
}

impl MmapReader {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| open_error(path, e))?;

        let size = file.seek(SeekFrom::End(0))?;
        if size == 0 {
            return Err(CoreError::InvalidConfig(format!(
                "cannot map empty source {}",
                path.display()
            )));
        }

        let mmap =
            unsafe { Mmap::map(&file) }.map_err(|e| CoreError::Io(std::io::Error::other(e)))?;

        if mmap.len() == 0 {
            return Err(CoreError::InvalidConfig(format!(
                "empty mapping for {} (block device?)",
                path.display()
            )));
        }

        #[cfg(target_os = "linux")]
        {
            use memmap2::Advice;
            let _ = mmap.advise(Advice::Sequential);
        }

        Ok(Self { mmap, size })
    }

    #[inline]
    pub fn slice(&self, offset: u64, len: usize) -> Option<&[u8]> {
        let start = usize::try_from(offset).ok()?;
        if start >= self.mmap.len() {
            return None;
        }
        let end = start.saturating_add(len).min(self.mmap.len());
        Some(&self.mmap[start..end])
    }
}

impl BlockSource for MmapReader {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        match self.slice(offset, buffer.len()) {
            Some(slice) => {
                let len = slice.len();
                buffer[..len].copy_from_slice(slice);
                Ok(len)
            }
            None => Ok(0),
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_slices_and_chunks() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let test_data = b"Hello, World! This is test data for MmapReader.";
        temp_file.write_all(test_data).unwrap();
        temp_file.flush().unwrap();

        let mut reader = MmapReader::new(temp_file.path()).unwrap();
        assert_eq!(reader.size(), test_data.len() as u64);
        assert_eq!(reader.slice(7, 4).unwrap(), b"Worl");

        let mut buffer = vec![0u8; 13];
        assert_eq!(reader.read_chunk(0, &mut buffer).unwrap(), 13);
        assert_eq!(&buffer, b"Hello, World!");
    }

    #[test]
    fn test_beyond_end() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"Short").unwrap();
        temp_file.flush().unwrap();

        let mut reader = MmapReader::new(temp_file.path()).unwrap();
        assert_eq!(reader.slice(0, 100).unwrap().len(), 5);
        assert!(reader.slice(100, 10).is_none());

        let mut buffer = vec![0u8; 8];
        assert_eq!(reader.read_chunk(100, &mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let temp_file = NamedTempFile::new().unwrap();
        assert!(MmapReader::new(temp_file.path()).is_err());
    }
}
