//! Destination of carved bytes.

use crate::error::Result;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Receives group creation, per-file byte streams and finalization.
///
/// The engine opens exactly one handle at a time and always hands it back
/// through [`OutputSink::finalize`], including on cancellation and at end of
/// stream.
pub trait OutputSink {
    type Handle: Write;

    /// Called once per new group, before any file is opened inside it.
    fn create_group(&mut self, location: &Path) -> Result<()>;

    fn open(&mut self, path: &Path) -> Result<Self::Handle>;

    /// Flushes and closes a file. Returns a hex content digest when the sink
    /// computes one.
    fn finalize(&mut self, handle: Self::Handle) -> Result<Option<String>>;
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    type Handle = S::Handle;

    fn create_group(&mut self, location: &Path) -> Result<()> {
        (**self).create_group(location)
    }

    fn open(&mut self, path: &Path) -> Result<Self::Handle> {
        (**self).open(path)
    }

    fn finalize(&mut self, handle: Self::Handle) -> Result<Option<String>> {
        (**self).finalize(handle)
    }
}

/// Keeps carved files in memory, keyed by their output path.
#[derive(Debug, Default)]
pub struct MemorySink {
    groups: Vec<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn groups(&self) -> &[PathBuf] {
        &self.groups
    }

    #[must_use]
    pub fn files(&self) -> &BTreeMap<PathBuf, Vec<u8>> {
        &self.files
    }

    #[must_use]
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&[u8]> {
        self.files.get(path.as_ref()).map(Vec::as_slice)
    }
}

#[derive(Debug)]
pub struct MemoryFile {
    path: PathBuf,
    data: Vec<u8>,
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputSink for MemorySink {
    type Handle = MemoryFile;

    fn create_group(&mut self, location: &Path) -> Result<()> {
        self.groups.push(location.to_path_buf());
        Ok(())
    }

    fn open(&mut self, path: &Path) -> Result<MemoryFile> {
        Ok(MemoryFile {
            path: path.to_path_buf(),
            data: Vec::new(),
        })
    }

    fn finalize(&mut self, handle: MemoryFile) -> Result<Option<String>> {
        self.files.insert(handle.path, handle.data);
        Ok(None)
    }
}
