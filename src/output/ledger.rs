//! Directory ledger
//!
//! Phase 1 appends every discovered directory (relative to the root) to
//! the ledger file; phase 2 streams it back in. The ledger is never held
//! in memory as a whole: [`LedgerReader`] reads fixed-size chunks and
//! splits them on NUL boundaries.

use crate::error::{OutputError, OutputResult};
use crate::output::writer::{NulWriter, DELIMITER};
use crate::paths;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Flush the ledger buffer every 65,536 records
pub const LEDGER_FLUSH_INTERVAL: u64 = 1 << 16;

/// Chunk size used when streaming the ledger back in
pub const LEDGER_READ_CHUNK: usize = 1024 * 1024;

/// Shared, append-only ledger writer.
///
/// All phase-1 workers append through one mutex; a record is written and
/// counted under the same lock.
pub struct LedgerWriter {
    writer: Mutex<Option<NulWriter<File>>>,
    path: PathBuf,
}

impl LedgerWriter {
    /// Create (truncate) the ledger at `path`
    pub fn create(path: &Path) -> OutputResult<Self> {
        let writer = NulWriter::create(path, false)?;
        Ok(Self {
            writer: Mutex::new(Some(writer)),
            path: path.to_path_buf(),
        })
    }

    /// Append one directory record
    pub fn append(&self, rel_dir: &Path) -> OutputResult<()> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or_else(|| self.closed())?;

        writer.write_record(&paths::to_bytes(rel_dir))?;
        if writer.records() % LEDGER_FLUSH_INTERVAL == 0 {
            writer.flush()?;
        }
        Ok(())
    }

    /// Records appended so far
    pub fn records(&self) -> u64 {
        self.writer.lock().as_ref().map_or(0, |w| w.records())
    }

    /// Flush, sync and close the ledger. Returns the record count.
    pub fn finish(&self) -> OutputResult<u64> {
        let writer = self.writer.lock().take().ok_or_else(|| self.closed())?;
        writer.finish_sync()
    }

    fn closed(&self) -> OutputError {
        OutputError::Write {
            path: self.path.clone(),
            source: std::io::Error::new(ErrorKind::BrokenPipe, "ledger already finished"),
        }
    }
}

/// Streams ledger records back as relative directory paths.
///
/// Yields `Err` once and then stops if the underlying read fails. An empty
/// record stands for the root. A trailing fragment with no terminating NUL
/// is a torn write and is dropped.
pub struct LedgerReader<R: Read> {
    source: R,
    label: PathBuf,
    buf: Vec<u8>,
    start: usize,
    chunk: usize,
    done: bool,
}

impl LedgerReader<File> {
    /// Open a ledger file for streaming
    pub fn open(path: &Path) -> OutputResult<Self> {
        let file = File::open(path).map_err(|source| OutputError::LedgerRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(file, path))
    }
}

impl<R: Read> LedgerReader<R> {
    /// Wrap any byte source
    pub fn new(source: R, label: impl Into<PathBuf>) -> Self {
        Self::with_chunk_size(source, label, LEDGER_READ_CHUNK)
    }

    /// Wrap a byte source, reading `chunk` bytes at a time
    pub fn with_chunk_size(source: R, label: impl Into<PathBuf>, chunk: usize) -> Self {
        Self {
            source,
            label: label.into(),
            buf: Vec::with_capacity(chunk),
            start: 0,
            chunk: chunk.max(1),
            done: false,
        }
    }

    /// Read one more chunk. Returns the number of bytes read.
    fn fill(&mut self) -> std::io::Result<usize> {
        // Drop consumed records before growing the buffer
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.start = 0;
        }

        let old_len = self.buf.len();
        self.buf.resize(old_len + self.chunk, 0);
        loop {
            match self.source.read(&mut self.buf[old_len..]) {
                Ok(n) => {
                    self.buf.truncate(old_len + n);
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(old_len);
                    return Err(e);
                }
            }
        }
    }
}

impl<R: Read> Iterator for LedgerReader<R> {
    type Item = OutputResult<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(pos) = self.buf[self.start..].iter().position(|&b| b == DELIMITER) {
                let record = &self.buf[self.start..self.start + pos];
                let path = if record.is_empty() {
                    PathBuf::from(paths::ROOT_MARKER)
                } else {
                    paths::from_bytes(record)
                };
                self.start += pos + 1;
                return Some(Ok(path));
            }

            if self.done {
                return None;
            }

            match self.fill() {
                Ok(0) => {
                    self.done = true;
                    if self.start < self.buf.len() {
                        warn!(
                            ledger = %self.label.display(),
                            bytes = self.buf.len() - self.start,
                            "Discarding unterminated trailing ledger record"
                        );
                    }
                    return None;
                }
                Ok(_) => {}
                Err(source) => {
                    self.done = true;
                    return Some(Err(OutputError::LedgerRead {
                        path: self.label.clone(),
                        source,
                    }));
                }
            }
        }
    }
}
