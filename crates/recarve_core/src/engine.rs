//! Block-sequential carving state machine.
//!
//! One pass scans the whole source for a single [`Signature`]. While
//! searching, each block is checked for the header; once a header is found
//! every following block is appended to the open file until its end is
//! detected:
//!
//! - footer signatures close on the first footer match, keeping
//!   `inclusive_len` bytes from the footer start, or on a 2-byte footer split
//!   exactly across a block boundary;
//! - footer-less signatures close just before the next occurrence of their
//!   own header, and the reader is rewound so that header starts a fresh
//!   block.
//!
//! Searches never span two blocks, so a header straddling a block boundary
//! is not seen, and a footer is never looked for inside the block where its
//! header was found.

use crate::error::{CoreError, Result};
use crate::groups::{GroupAllocator, GroupNaming, RecoveryGroup, DEFAULT_FILES_PER_GROUP};
use crate::reader::{BlockReader, DEFAULT_BLOCK_SIZE};
use crate::scanners::SignatureScanner;
use crate::signatures::{EndMarker, Signature};
use crate::sink::OutputSink;
use crate::traits::BlockSource;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

const PROGRESS_INTERVAL: u64 = 1024 * 1024;
const FIRST_FILE_NUMBER: u64 = 1;

#[derive(Debug, Clone)]
pub struct CarveConfig {
    pub block_size: usize,
    pub files_per_group: usize,
    pub group_naming: GroupNaming,
}

impl Default for CarveConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            files_per_group: DEFAULT_FILES_PER_GROUP,
            group_naming: GroupNaming::Random,
        }
    }
}

impl CarveConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(CoreError::InvalidConfig("block size must be non-zero".into()));
        }
        if self.files_per_group == 0 {
            return Err(CoreError::InvalidConfig(
                "files per group must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredFile {
    pub number: u64,
    pub format: String,
    pub path: PathBuf,
    pub group_id: String,
    pub header_offset: u64,
    pub length: u64,
    /// The source ended, or the run was cancelled, before the file's end was found.
    pub truncated: bool,
    pub digest: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PassSummary {
    format: String,
    extension: String,
    files: Vec<RecoveredFile>,
    cancelled: bool,
}

impl PassSummary {
    fn new(signature: &Signature) -> Self {
        Self {
            format: signature.name().to_string(),
            extension: signature.extension().to_string(),
            files: Vec::new(),
            cancelled: false,
        }
    }

    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    #[must_use]
    pub fn files(&self) -> &[RecoveredFile] {
        &self.files
    }

    #[must_use]
    pub fn recovered(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn truncated(&self) -> usize {
        self.files.iter().filter(|f| f.truncated).count()
    }

    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }
}

#[derive(Debug, Clone, Default)]
pub struct CarveSummary {
    passes: Vec<PassSummary>,
    cancelled: bool,
}

impl CarveSummary {
    #[must_use]
    pub fn passes(&self) -> &[PassSummary] {
        &self.passes
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.passes.iter().map(PassSummary::recovered).sum()
    }

    #[must_use]
    pub fn truncated(&self) -> usize {
        self.passes.iter().map(PassSummary::truncated).sum()
    }

    /// True when the run stopped early on request.
    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn files(&self) -> impl Iterator<Item = &RecoveredFile> {
        self.passes.iter().flat_map(|p| p.files.iter())
    }
}

#[derive(Debug)]
pub enum CarveEvent<'a> {
    PassStarted {
        signature: &'a Signature,
        source_size: u64,
    },
    HeaderFound {
        signature: &'a Signature,
        offset: u64,
    },
    GroupCreated(&'a RecoveryGroup),
    FileRecovered(&'a RecoveredFile),
    Progress {
        signature: &'a Signature,
        offset: u64,
    },
    PassFinished(&'a PassSummary),
}

struct CarveSession<H> {
    number: u64,
    path: PathBuf,
    group_id: String,
    header_offset: u64,
    handle: H,
    written: u64,
    last_byte: Option<u8>,
}

impl<H: Write> CarveSession<H> {
    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.handle.write_all(bytes)?;
        self.written += bytes.len() as u64;
        self.last_byte = bytes.last().copied().or(self.last_byte);
        Ok(())
    }
}

/// Runs carving passes and writes recovered files through an [`OutputSink`].
///
/// The file counter and the group allocator live on the engine, so numbering
/// and group occupancy carry over from one pass to the next.
pub struct CarvingEngine<S: OutputSink> {
    config: CarveConfig,
    sink: S,
    groups: GroupAllocator,
    next_file_number: u64,
    files_finalized: u64,
}

impl<S: OutputSink> CarvingEngine<S> {
    pub fn new(config: CarveConfig, base: impl Into<PathBuf>, sink: S) -> Result<Self> {
        config.validate()?;
        let groups = GroupAllocator::new(base, config.files_per_group, config.group_naming);
        Ok(Self {
            config,
            sink,
            groups,
            next_file_number: FIRST_FILE_NUMBER,
            files_finalized: 0,
        })
    }

    /// Runs one pass per signature, in order.
    ///
    /// `running` is polled before every block; once it reads `false` the
    /// open file is finalized and the run returns with `cancelled` set.
    pub fn run<B: BlockSource + ?Sized>(
        &mut self,
        source: &mut B,
        signatures: &[&Signature],
        running: &AtomicBool,
        observer: &mut dyn FnMut(&CarveEvent<'_>),
    ) -> Result<CarveSummary> {
        for signature in signatures {
            signature.validate()?;
            if signature.header().len() > self.config.block_size {
                return Err(CoreError::InvalidConfig(format!(
                    "{}-byte header of '{}' cannot fit in a {}-byte block",
                    signature.header().len(),
                    signature.name(),
                    self.config.block_size
                )));
            }
        }

        let mut summary = CarveSummary::default();
        for signature in signatures {
            if !running.load(Ordering::SeqCst) {
                summary.cancelled = true;
                break;
            }
            let pass = self.carve_pass(source, signature, running, observer)?;
            let cancelled = pass.cancelled;
            summary.passes.push(pass);
            if cancelled {
                summary.cancelled = true;
                break;
            }
        }

        info!(
            total = summary.total(),
            truncated = summary.truncated(),
            cancelled = summary.cancelled,
            "carving run finished"
        );
        Ok(summary)
    }

    /// Scans the whole source once for `signature`, starting at offset 0.
    pub fn carve_pass<B: BlockSource + ?Sized>(
        &mut self,
        source: &mut B,
        signature: &Signature,
        running: &AtomicBool,
        observer: &mut dyn FnMut(&CarveEvent<'_>),
    ) -> Result<PassSummary> {
        let scanner = SignatureScanner::new(signature);
        let mut reader = BlockReader::new(source, self.config.block_size)?;
        reader.rewind();

        observer(&CarveEvent::PassStarted {
            signature,
            source_size: reader.source_size(),
        });
        info!(format = signature.name(), "scanning");

        let mut pass = PassSummary::new(signature);
        let mut session = None;
        let scanned = self.scan_blocks(
            &mut reader,
            &scanner,
            signature,
            running,
            observer,
            &mut session,
            &mut pass,
        );

        if let Err(err) = scanned {
            // keep what was written before the failure
            if let Some(open) = session.take() {
                match self.finish(signature, open, true, observer) {
                    Ok(file) => pass.files.push(file),
                    Err(finalize_err) => {
                        warn!(error = %finalize_err, "could not finalize partial file")
                    }
                }
            }
            warn!(
                format = signature.name(),
                offset = reader.position(),
                error = %err,
                recovered = pass.recovered(),
                "pass aborted"
            );
            return Err(err);
        }

        info!(
            format = signature.name(),
            recovered = pass.recovered(),
            truncated = pass.truncated(),
            "pass finished"
        );
        observer(&CarveEvent::PassFinished(&pass));
        Ok(pass)
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_blocks<B: BlockSource + ?Sized>(
        &mut self,
        reader: &mut BlockReader<'_, B>,
        scanner: &SignatureScanner<'_>,
        signature: &Signature,
        running: &AtomicBool,
        observer: &mut dyn FnMut(&CarveEvent<'_>),
        session: &mut Option<CarveSession<S::Handle>>,
        pass: &mut PassSummary,
    ) -> Result<()> {
        let mut next_progress = PROGRESS_INTERVAL;

        loop {
            if !running.load(Ordering::SeqCst) {
                if let Some(open) = session.take() {
                    let file = self.finish(signature, open, true, observer)?;
                    pass.files.push(file);
                }
                warn!(
                    format = signature.name(),
                    offset = reader.position(),
                    "scan cancelled"
                );
                pass.cancelled = true;
                break;
            }

            let block_start = reader.position();
            let block = reader.read()?;
            if block.is_empty() {
                if let Some(open) = session.take() {
                    let file = self.finish(signature, open, true, observer)?;
                    pass.files.push(file);
                }
                break;
            }

            let mut cursor = 0usize;
            let mut resume_at = None;
            loop {
                let Some(open) = session.as_mut() else {
                    let Some(found) = scanner.find_header(&block[cursor..]) else {
                        break;
                    };
                    let start = cursor + found;
                    let opened = self.open(signature, block_start + start as u64, observer)?;
                    session.insert(opened).append(&block[start..])?;
                    break;
                };

                match signature.end() {
                    EndMarker::Footer {
                        bytes,
                        inclusive_len,
                    } => {
                        let split = bytes.len() == 2
                            && open.last_byte == Some(bytes[0])
                            && block[0] == bytes[1];
                        let end = if split {
                            Some(1)
                        } else {
                            scanner
                                .find_footer(block)
                                .map(|q| (q + inclusive_len).min(block.len()))
                        };

                        let Some(end) = end else {
                            open.append(block)?;
                            break;
                        };
                        open.append(&block[..end])?;
                        if let Some(done) = session.take() {
                            let file = self.finish(signature, done, false, observer)?;
                            pass.files.push(file);
                        }
                        cursor = end;
                    }
                    EndMarker::NextHeader => {
                        match scanner.find_header(block) {
                            Some(next) => {
                                open.append(&block[..next])?;
                                if let Some(done) = session.take() {
                                    let file = self.finish(signature, done, false, observer)?;
                                    pass.files.push(file);
                                }
                                resume_at = Some(block_start + next as u64);
                            }
                            None => open.append(block)?,
                        }
                        break;
                    }
                }
            }

            if let Some(offset) = resume_at {
                debug!(offset, "rewinding to next header");
                reader.seek_absolute(offset);
            }

            if reader.position() >= next_progress {
                observer(&CarveEvent::Progress {
                    signature,
                    offset: reader.position(),
                });
                next_progress = reader.position() + PROGRESS_INTERVAL;
            }
        }

        Ok(())
    }

    fn open(
        &mut self,
        signature: &Signature,
        header_offset: u64,
        observer: &mut dyn FnMut(&CarveEvent<'_>),
    ) -> Result<CarveSession<S::Handle>> {
        debug!(
            format = signature.name(),
            offset = header_offset,
            "header found"
        );
        observer(&CarveEvent::HeaderFound {
            signature,
            offset: header_offset,
        });

        let allocation = self.groups.allocate();
        let group = allocation.group;
        if allocation.created {
            self.sink.create_group(group.location())?;
            info!(group = group.id(), "created group");
            observer(&CarveEvent::GroupCreated(group));
        }

        let number = self.next_file_number;
        self.next_file_number += 1;
        let path = group
            .location()
            .join(format!("{}.{}", number, signature.extension()));
        let handle = self.sink.open(&path)?;

        Ok(CarveSession {
            number,
            path,
            group_id: group.id().to_string(),
            header_offset,
            handle,
            written: 0,
            last_byte: None,
        })
    }

    fn finish(
        &mut self,
        signature: &Signature,
        session: CarveSession<S::Handle>,
        truncated: bool,
        observer: &mut dyn FnMut(&CarveEvent<'_>),
    ) -> Result<RecoveredFile> {
        let digest = self.sink.finalize(session.handle)?;
        self.files_finalized += 1;
        let file = RecoveredFile {
            number: session.number,
            format: signature.name().to_string(),
            path: session.path,
            group_id: session.group_id,
            header_offset: session.header_offset,
            length: session.written,
            truncated,
            digest,
        };

        if truncated {
            warn!(
                path = %file.path.display(),
                bytes = file.length,
                "file end not found, keeping truncated data"
            );
        } else {
            info!(path = %file.path.display(), bytes = file.length, "recovered file");
        }
        observer(&CarveEvent::FileRecovered(&file));
        Ok(file)
    }

    /// Files handed back to the sink, complete or truncated. Stays accurate
    /// when a run ends in an error.
    #[must_use]
    pub fn files_recovered(&self) -> u64 {
        self.files_finalized
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::SignatureRegistry;
    use crate::sink::MemorySink;

    fn engine() -> CarvingEngine<MemorySink> {
        let config = CarveConfig {
            group_naming: GroupNaming::Sequential,
            ..CarveConfig::default()
        };
        CarvingEngine::new(config, "/out", MemorySink::new()).unwrap()
    }

    fn jpeg_at(len: usize, header: usize, footer: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[header..header + 3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        data[footer..footer + 2].copy_from_slice(&[0xFF, 0xD9]);
        data
    }

    fn kind(event: &CarveEvent<'_>) -> &'static str {
        match event {
            CarveEvent::PassStarted { .. } => "pass-started",
            CarveEvent::HeaderFound { .. } => "header",
            CarveEvent::GroupCreated(_) => "group",
            CarveEvent::FileRecovered(_) => "file",
            CarveEvent::Progress { .. } => "progress",
            CarveEvent::PassFinished(_) => "pass-finished",
        }
    }

    #[test]
    fn test_default_config_values() {
        let config = CarveConfig::default();
        assert_eq!(config.block_size, 512);
        assert_eq!(config.files_per_group, 4);
        assert_eq!(config.group_naming, GroupNaming::Random);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_values_are_rejected() {
        let config = CarveConfig {
            block_size: 0,
            ..CarveConfig::default()
        };
        assert!(matches!(
            CarvingEngine::new(config, "/out", MemorySink::new()),
            Err(CoreError::InvalidConfig(_))
        ));

        let config = CarveConfig {
            files_per_group: 0,
            ..CarveConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_header_longer_than_block_is_rejected_before_reading() {
        let registry = SignatureRegistry::builtin();
        let mp4 = registry.get("mp4").unwrap();
        let config = CarveConfig {
            block_size: 8,
            ..CarveConfig::default()
        };
        let mut engine = CarvingEngine::new(config, "/out", MemorySink::new()).unwrap();
        let running = AtomicBool::new(true);
        let mut source = vec![0u8; 64];

        let result = engine.run(&mut source, &[mp4], &running, &mut |_| {});

        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
        assert!(engine.sink().files().is_empty());
    }

    #[test]
    fn test_events_arrive_in_order() {
        let registry = SignatureRegistry::builtin();
        let jpg = registry.get("jpg").unwrap();
        let mut engine = engine();
        let running = AtomicBool::new(true);
        let mut source = jpeg_at(2048, 100, 1600);

        let mut seen = Vec::new();
        let summary = engine
            .run(&mut source, &[jpg], &running, &mut |event| seen.push(kind(event)))
            .unwrap();

        assert_eq!(
            seen,
            ["pass-started", "header", "group", "file", "pass-finished"]
        );
        assert_eq!(summary.total(), 1);
        assert_eq!(engine.files_recovered(), 1);
    }

    #[test]
    fn test_recovered_file_event_carries_location() {
        let registry = SignatureRegistry::builtin();
        let jpg = registry.get("jpg").unwrap();
        let mut engine = engine();
        let running = AtomicBool::new(true);
        let mut source = jpeg_at(2048, 100, 1600);

        let mut recovered = Vec::new();
        engine
            .run(&mut source, &[jpg], &running, &mut |event| {
                if let CarveEvent::FileRecovered(file) = event {
                    recovered.push((*file).clone());
                }
            })
            .unwrap();

        assert_eq!(recovered.len(), 1);
        let file = &recovered[0];
        assert_eq!(file.number, 1);
        assert_eq!(file.format, "jpg");
        assert_eq!(file.group_id, "group-0001");
        assert_eq!(file.path, PathBuf::from("/out/group-0001/1.jpg"));
        assert_eq!(file.header_offset, 100);
        assert_eq!(file.length, 1502);
        assert!(!file.truncated);
        assert_eq!(file.digest, None);
    }

    #[test]
    fn test_progress_is_reported_every_mebibyte() {
        let registry = SignatureRegistry::builtin();
        let png = registry.get("png").unwrap();
        let mut engine = engine();
        let running = AtomicBool::new(true);
        let mut source = vec![0u8; 5 * 512 * 1024];

        let mut offsets = Vec::new();
        engine
            .run(&mut source, &[png], &running, &mut |event| {
                if let CarveEvent::Progress { offset, .. } = event {
                    offsets.push(*offset);
                }
            })
            .unwrap();

        assert_eq!(offsets, [1024 * 1024, 2 * 1024 * 1024]);
    }

    #[test]
    fn test_stopped_flag_skips_every_pass() {
        let registry = SignatureRegistry::builtin();
        let all = registry.signatures_for(&crate::Selection::All).unwrap();
        let mut engine = engine();
        let running = AtomicBool::new(false);
        let mut source = jpeg_at(2048, 100, 1600);

        let summary = engine.run(&mut source, &all, &running, &mut |_| {}).unwrap();

        assert!(summary.cancelled());
        assert!(summary.passes().is_empty());
        assert_eq!(summary.total(), 0);
    }
}
