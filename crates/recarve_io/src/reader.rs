//! Block reader for physical disks and image files.

use crate::open_error;
use recarve_core::{BlockSource, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// A read-only block source over a device node or an image file.
///
/// Works for anything `open(2)` accepts: whole disks (`/dev/sda`),
/// partitions (`/dev/sda1`), raw Windows volumes (`\\.\C:`) and plain image
/// files. The size is taken by seeking to the end, which also works for block
/// devices whose metadata length is zero.
pub struct DiskReader {
    file: File,
    size: u64,
}

impl DiskReader {
    /// Opens `path` read-only. Permission and not-found failures name the path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(false)
            .open(path)
            .map_err(|e| open_error(path, e))?;

        #[cfg(target_os = "linux")]
        {
            use rustix::fs::{fadvise, Advice};

            let _ = fadvise(&file, 0, None, Advice::Sequential);
            let _ = fadvise(&file, 0, None, Advice::NoReuse);
        }

        let size = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(0))?;
        debug!(path = %path.display(), size, "opened device");

        Ok(Self { file, size })
    }
}

impl BlockSource for DiskReader {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        let bytes_read = self.file.read(buffer)?;

        Ok(bytes_read)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recarve_core::CoreError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_reads_at_offsets() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let test_data = b"Hello, World! This is test data for DiskReader.";
        temp_file.write_all(test_data).unwrap();
        temp_file.flush().unwrap();
        let mut reader = DiskReader::new(temp_file.path()).unwrap();

        assert_eq!(reader.size(), test_data.len() as u64);

        let mut buffer = vec![0u8; 13];
        assert_eq!(reader.read_chunk(0, &mut buffer).unwrap(), 13);
        assert_eq!(&buffer, b"Hello, World!");

        let mut buffer = vec![0u8; 4];
        assert_eq!(reader.read_chunk(7, &mut buffer).unwrap(), 4);
        assert_eq!(&buffer, b"Worl");
    }

    #[test]
    fn test_short_read_at_end() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"Short").unwrap();
        temp_file.flush().unwrap();
        let mut reader = DiskReader::new(temp_file.path()).unwrap();

        let mut buffer = vec![0u8; 100];
        assert_eq!(reader.read_chunk(0, &mut buffer).unwrap(), 5);
        assert_eq!(reader.read_chunk(5, &mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_missing_device_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-disk");

        match DiskReader::new(&path) {
            Err(CoreError::NotFound(message)) => assert!(message.contains("no-such-disk")),
            other => panic!("expected NotFound, got {:?}", other.err()),
        }
    }
}
