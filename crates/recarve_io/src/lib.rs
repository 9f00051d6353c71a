mod mmap_reader;
mod reader;
mod sink;

pub use mmap_reader::MmapReader;
pub use reader::DiskReader;
pub use sink::{FsFile, FsSink};

use recarve_core::{BlockSource, CoreError, Result};
use std::io;
use std::path::Path;
use tracing::debug;

/// Maps an open/create failure to a [`CoreError`] that names `path`.
pub(crate) fn open_error(path: &Path, err: io::Error) -> CoreError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => CoreError::PermissionDenied(path.display().to_string()),
        io::ErrorKind::NotFound => CoreError::NotFound(path.display().to_string()),
        _ => CoreError::Io(err),
    }
}

pub enum Reader {
    Mmap(MmapReader),
    Disk(DiskReader),
}

impl Reader {
    /// Maps image files and falls back to plain reads for devices.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match MmapReader::new(path) {
            Ok(r) => Ok(Reader::Mmap(r)),
            Err(err @ (CoreError::PermissionDenied(_) | CoreError::NotFound(_))) => Err(err),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "mmap unavailable, using reads");
                Ok(Reader::Disk(DiskReader::new(path)?))
            }
        }
    }

    #[inline]
    pub fn is_mmap(&self) -> bool {
        matches!(self, Reader::Mmap(_))
    }
}

impl BlockSource for Reader {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        match self {
            Reader::Mmap(r) => r.read_chunk(offset, buffer),
            Reader::Disk(r) => r.read_chunk(offset, buffer),
        }
    }

    fn size(&self) -> u64 {
        match self {
            Reader::Mmap(r) => r.size(),
            Reader::Disk(r) => r.size(),
        }
    }
}
