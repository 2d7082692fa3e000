//! Buffered writer for NUL-terminated records
//!
//! Every output of the crawler (ledger, manifest, shards) is a flat
//! sequence of path bytes, each followed by a single `0x00`. There are no
//! length prefixes and no other separators, so a record must never
//! contain a NUL itself.
//!
//! # Performance Characteristics
//!
//! - 1 MiB `BufWriter` per sink, so millions of tiny appends cost a
//!   handful of syscalls
//! - Flushing is left to the owner (ledger and shard set flush on a
//!   record-count interval) instead of once per write

use crate::error::{OutputError, OutputResult};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Record terminator
pub const DELIMITER: u8 = 0;

/// Buffer size for every output sink
pub const WRITE_BUFFER_SIZE: usize = 1024 * 1024;

/// Appends NUL-terminated records to a sink
pub struct NulWriter<W: Write> {
    /// Buffered sink
    inner: BufWriter<W>,

    /// Label used in error messages (file path, or a name for in-memory sinks)
    label: PathBuf,

    /// Records written so far
    records: u64,

    /// Bytes written so far, delimiters included
    bytes: u64,
}

impl NulWriter<File> {
    /// Open `path` for writing.
    ///
    /// With `append` the file is extended, otherwise it is truncated.
    pub fn create(path: &Path, append: bool) -> OutputResult<Self> {
        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }

        let file = options.open(path).map_err(|source| OutputError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::new(file, path))
    }

    /// Flush buffered records and sync the file to disk
    pub fn finish_sync(self) -> OutputResult<u64> {
        let label = self.label.clone();
        let records = self.records;
        let file = self.finish()?;
        file.sync_all()
            .map_err(|source| OutputError::Flush { path: label, source })?;
        Ok(records)
    }
}

impl<W: Write> NulWriter<W> {
    /// Wrap an arbitrary sink
    pub fn new(sink: W, label: impl Into<PathBuf>) -> Self {
        Self {
            inner: BufWriter::with_capacity(WRITE_BUFFER_SIZE, sink),
            label: label.into(),
            records: 0,
            bytes: 0,
        }
    }

    /// Append one record followed by the delimiter
    pub fn write_record(&mut self, record: &[u8]) -> OutputResult<()> {
        if record.contains(&DELIMITER) {
            return Err(OutputError::EmbeddedNul {
                path: String::from_utf8_lossy(record).into_owned(),
            });
        }

        let written = self
            .inner
            .write_all(record)
            .and_then(|()| self.inner.write_all(&[DELIMITER]));
        if let Err(source) = written {
            return Err(OutputError::Write {
                path: self.label.clone(),
                source,
            });
        }

        self.records += 1;
        self.bytes += record.len() as u64 + 1;
        Ok(())
    }

    /// Push buffered records to the underlying sink
    pub fn flush(&mut self) -> OutputResult<()> {
        self.inner.flush().map_err(|source| OutputError::Flush {
            path: self.label.clone(),
            source,
        })
    }

    /// Flush and hand back the underlying sink
    pub fn finish(self) -> OutputResult<W> {
        let label = self.label;
        self.inner.into_inner().map_err(|e| OutputError::Flush {
            path: label,
            source: e.into_error(),
        })
    }

    /// Records written so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Bytes written so far
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Sink label (path of the file)
    pub fn label(&self) -> &Path {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_records_are_nul_terminated() {
        let mut writer = NulWriter::new(Vec::new(), "mem");
        writer.write_record(b"a/x.txt").unwrap();
        writer.write_record(b"f1.txt").unwrap();

        assert_eq!(writer.records(), 2);
        assert_eq!(writer.bytes(), 15);
        let buf = writer.finish().unwrap();
        assert_eq!(buf, b"a/x.txt\0f1.txt\0");
    }

    #[test]
    fn test_embedded_nul_rejected() {
        let mut writer = NulWriter::new(Vec::new(), "mem");
        let err = writer.write_record(b"bad\0name").unwrap_err();
        assert!(matches!(err, OutputError::EmbeddedNul { .. }));
        assert_eq!(writer.records(), 0);
        assert!(writer.finish().unwrap().is_empty());
    }

    #[test]
    fn test_truncate_and_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.nul");

        let mut w = NulWriter::create(&path, false).unwrap();
        w.write_record(b"one").unwrap();
        w.finish_sync().unwrap();

        let mut w = NulWriter::create(&path, true).unwrap();
        w.write_record(b"two").unwrap();
        w.finish_sync().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"one\0two\0");

        let mut w = NulWriter::create(&path, false).unwrap();
        w.write_record(b"three").unwrap();
        assert_eq!(w.finish_sync().unwrap(), 1);
        assert_eq!(std::fs::read(&path).unwrap(), b"three\0");
    }

    #[test]
    fn test_open_failure_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.nul");
        match NulWriter::create(&path, false) {
            Err(OutputError::Open { path: p, .. }) => assert_eq!(p, path),
            _ => panic!("expected open failure"),
        }
    }
}
