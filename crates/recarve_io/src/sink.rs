//! Filesystem output for carved files.

use crate::open_error;
use recarve_core::{OutputSink, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes each carved file to disk and hashes it on the way through.
pub struct FsSink {
    base: PathBuf,
    files_written: u64,
    bytes_written: u64,
}

impl FsSink {
    /// Creates `base` if it does not exist yet.
    pub fn create(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        fs::create_dir_all(&base).map_err(|e| open_error(&base, e))?;
        Ok(Self {
            base,
            files_written: 0,
            bytes_written: 0,
        })
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    #[must_use]
    pub fn files_written(&self) -> u64 {
        self.files_written
    }

    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// An open output file. Bytes are hashed as they are accepted.
pub struct FsFile {
    path: PathBuf,
    writer: BufWriter<File>,
    hasher: Sha256,
    written: u64,
}

impl Write for FsFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl OutputSink for FsSink {
    type Handle = FsFile;

    fn create_group(&mut self, location: &Path) -> Result<()> {
        fs::create_dir_all(location).map_err(|e| open_error(location, e))
    }

    fn open(&mut self, path: &Path) -> Result<FsFile> {
        let file = File::create(path).map_err(|e| open_error(path, e))?;
        Ok(FsFile {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            hasher: Sha256::new(),
            written: 0,
        })
    }

    fn finalize(&mut self, handle: FsFile) -> Result<Option<String>> {
        let FsFile {
            path,
            writer,
            hasher,
            written,
        } = handle;
        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.sync_all()?;

        self.files_written += 1;
        self.bytes_written += written;

        let digest = hex::encode(hasher.finalize());
        debug!(path = %path.display(), sha256 = %digest, "file synced");
        Ok(Some(digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_file_and_reports_digest() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FsSink::create(dir.path().join("out")).unwrap();
        let group = sink.base().join("g1");

        sink.create_group(&group).unwrap();
        let path = group.join("1.txt");
        let mut handle = sink.open(&path).unwrap();
        handle.write_all(b"hello ").unwrap();
        handle.write_all(b"world").unwrap();
        let digest = sink.finalize(handle).unwrap().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"hello world");
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(sink.files_written(), 1);
        assert_eq!(sink.bytes_written(), 11);
    }

    #[test]
    fn test_empty_file_digest() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FsSink::create(dir.path()).unwrap();
        let handle = sink.open(&dir.path().join("empty.bin")).unwrap();

        assert_eq!(
            sink.finalize(handle).unwrap().as_deref(),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
    }

    #[test]
    fn test_base_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("a").join("b");
        FsSink::create(&base).unwrap();
        assert!(base.is_dir());
    }
}
