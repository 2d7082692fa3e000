//! Shard routing and the set of output sinks for file records
//!
//! Files are routed to one of N sinks:
//! - `roundrobin`: shared counter modulo N (order dependent)
//! - `hash`: BLAKE2b of the full relative path (balance)
//! - `bydir`: BLAKE2b of the owning directory (locality)
//!
//! For the hash modes the key goes through BLAKE2b with a 4-byte digest
//! size, read as a little-endian `u32`, modulo N. A 4-byte BLAKE2b is its
//! own parameterisation, not a truncated BLAKE2b-512. It depends on nothing but the key, so
//! re-running a crawl over an unchanged tree yields the same partition.

use crate::error::OutputResult;
use crate::output::writer::NulWriter;
use crate::paths;
use blake2::digest::consts::U4;
use blake2::{Blake2b, Digest};
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Flush every shard after this many files have been emitted (~1M)
pub const SHARD_FLUSH_INTERVAL: u64 = 1 << 20;

/// Shard selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ShardMode {
    /// Arrival order, shared counter
    #[value(name = "roundrobin")]
    RoundRobin,
    /// Hash of the full relative file path
    Hash,
    /// Hash of the owning directory's relative path
    #[default]
    #[value(name = "bydir")]
    ByDir,
}

impl ShardMode {
    /// Name as accepted on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            ShardMode::RoundRobin => "roundrobin",
            ShardMode::Hash => "hash",
            ShardMode::ByDir => "bydir",
        }
    }
}

impl fmt::Display for ShardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShardMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "roundrobin" => Ok(ShardMode::RoundRobin),
            "hash" => Ok(ShardMode::Hash),
            "bydir" => Ok(ShardMode::ByDir),
            other => Err(format!("unknown shard mode '{other}'")),
        }
    }
}

/// BLAKE2b with a 32-bit digest
type Blake2b32 = Blake2b<U4>;

/// 32-bit routing hash of a key
fn key_hash(key: &[u8]) -> u32 {
    let digest = Blake2b32::digest(key);
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&digest);
    u32::from_le_bytes(bytes)
}

/// Shard index for a routing key under the hash modes
pub fn hash_index(key: &[u8], shards: usize) -> usize {
    (key_hash(key) as u64 % shards.max(1) as u64) as usize
}

/// Maps file records onto shard indices
#[derive(Debug)]
pub struct ShardRouter {
    mode: ShardMode,
    shards: usize,
    counter: AtomicU64,
}

impl ShardRouter {
    /// Create a router over `shards` sinks (at least one)
    pub fn new(mode: ShardMode, shards: usize) -> Self {
        Self {
            mode,
            shards: shards.max(1),
            counter: AtomicU64::new(0),
        }
    }

    /// Select a shard for a file, given its relative path and the relative
    /// path of the directory that owns it
    pub fn route(&self, file_rel: &Path, dir_rel: &Path) -> usize {
        if self.shards == 1 {
            return 0;
        }

        match self.mode {
            ShardMode::RoundRobin => {
                let n = self.counter.fetch_add(1, Ordering::Relaxed);
                (n % self.shards as u64) as usize
            }
            ShardMode::Hash => hash_index(&paths::to_bytes(file_rel), self.shards),
            ShardMode::ByDir => hash_index(&paths::to_bytes(dir_rel), self.shards),
        }
    }
}

/// Summary of one shard once it has been closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSummary {
    /// Output file
    pub path: PathBuf,

    /// File records written
    pub records: u64,

    /// Bytes written
    pub bytes: u64,
}

/// File name of shard `index` inside the shard directory
pub fn shard_file_name(index: usize) -> String {
    format!("shard_{index:05}.nul")
}

/// The set of file-record sinks, each behind its own lock
pub struct ShardSet {
    sinks: Vec<Mutex<NulWriter<File>>>,
    router: ShardRouter,
    emitted: AtomicU64,
    flush_interval: u64,
}

impl ShardSet {
    /// Single-sink set writing to one manifest file
    pub fn manifest(path: &Path, append: bool) -> OutputResult<Self> {
        let sink = NulWriter::create(path, append)?;
        Ok(Self::from_sinks(vec![sink], ShardRouter::new(ShardMode::ByDir, 1)))
    }

    /// `count` shard files named `shard_00000.nul`.. inside `dir`
    pub fn sharded(dir: &Path, count: usize, mode: ShardMode, append: bool) -> OutputResult<Self> {
        let sinks = (0..count.max(1))
            .map(|i| NulWriter::create(&dir.join(shard_file_name(i)), append))
            .collect::<OutputResult<Vec<_>>>()?;
        let router = ShardRouter::new(mode, sinks.len());
        Ok(Self::from_sinks(sinks, router))
    }

    fn from_sinks(sinks: Vec<NulWriter<File>>, router: ShardRouter) -> Self {
        Self {
            sinks: sinks.into_iter().map(Mutex::new).collect(),
            router,
            emitted: AtomicU64::new(0),
            flush_interval: SHARD_FLUSH_INTERVAL,
        }
    }

    /// Override the periodic flush interval
    pub fn with_flush_interval(mut self, interval: u64) -> Self {
        self.flush_interval = interval.max(1);
        self
    }

    /// Route and write one file record. Returns the shard index used.
    pub fn write(&self, file_rel: &Path, dir_rel: &Path) -> OutputResult<usize> {
        let index = self.router.route(file_rel, dir_rel);
        let record = paths::to_bytes(file_rel);

        // Only this shard's lock is held while writing
        self.sinks[index].lock().write_record(&record)?;

        let emitted = self.emitted.fetch_add(1, Ordering::Relaxed) + 1;
        if emitted % self.flush_interval == 0 {
            self.flush_all()?;
        }
        Ok(index)
    }

    /// Flush every shard's buffer, one lock at a time
    pub fn flush_all(&self) -> OutputResult<()> {
        for sink in &self.sinks {
            sink.lock().flush()?;
        }
        Ok(())
    }

    /// File records written across all shards
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Number of shards
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Always false; a set has at least one sink
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Flush, sync and close every shard
    pub fn finish(self) -> OutputResult<Vec<ShardSummary>> {
        self.sinks
            .into_iter()
            .map(|sink| {
                let sink = sink.into_inner();
                let path = sink.label().to_path_buf();
                let bytes = sink.bytes();
                let records = sink.finish_sync()?;
                Ok(ShardSummary {
                    path,
                    records,
                    bytes,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[test]
    fn test_single_shard_always_zero() {
        for mode in [ShardMode::RoundRobin, ShardMode::Hash, ShardMode::ByDir] {
            let router = ShardRouter::new(mode, 1);
            for i in 0..10 {
                let file = PathBuf::from(format!("d/{i}.txt"));
                assert_eq!(router.route(&file, Path::new("d")), 0);
            }
        }
    }

    #[test]
    fn test_bydir_keeps_directory_together() {
        let router = ShardRouter::new(ShardMode::ByDir, 4);
        let a = router.route(Path::new("d/p.txt"), Path::new("d"));
        let b = router.route(Path::new("d/q.txt"), Path::new("d"));
        assert_eq!(a, b);
        assert!(a < 4);
    }

    #[test]
    fn test_hash_is_stable_across_routers() {
        let first = ShardRouter::new(ShardMode::Hash, 7);
        let second = ShardRouter::new(ShardMode::Hash, 7);
        for i in 0..100 {
            let file = PathBuf::from(format!("dir{}/file{i}", i % 3));
            let dir = file.parent().unwrap().to_path_buf();
            assert_eq!(first.route(&file, &dir), second.route(&file, &dir));
        }
    }

    #[test]
    fn test_hash_spreads_one_directory() {
        let router = ShardRouter::new(ShardMode::Hash, 8);
        let used: HashSet<usize> = (0..256)
            .map(|i| router.route(&PathBuf::from(format!("d/{i}")), Path::new("d")))
            .collect();
        assert!(used.len() > 1);
    }

    #[test]
    fn test_key_hash_known_values() {
        // blake2b(key, digest_size=4), little-endian
        assert_eq!(key_hash(b"some/dir"), 2_525_661_878);
        assert_eq!(key_hash(b"."), 2_316_478_424);
        assert_eq!(key_hash(b"d"), 1_005_264_863);
        assert_eq!(key_hash(b"a/x.txt"), 900_570_258);
        // Not the prefix of a full-width BLAKE2b-512 digest
        assert_ne!(key_hash(b"some/dir"), 3_978_353_916);
    }

    #[test]
    fn test_hash_index_known_values() {
        assert_eq!(hash_index(b"some/dir", 5), 3);
        assert_eq!(hash_index(b"some/dir", 7), 5);
        assert_eq!(hash_index(b".", 4), 0);
        assert_eq!(hash_index(b"d", 4), 3);
        assert_eq!(hash_index(b"a/x.txt", 7), 0);
    }

    #[test]
    fn test_router_uses_expected_key_per_mode() {
        let bydir = ShardRouter::new(ShardMode::ByDir, 4);
        assert_eq!(bydir.route(Path::new("d/p.txt"), Path::new("d")), 3);

        let hash = ShardRouter::new(ShardMode::Hash, 7);
        assert_eq!(hash.route(Path::new("a/x.txt"), Path::new("a")), 0);
    }

    #[test]
    fn test_roundrobin_balances() {
        let router = ShardRouter::new(ShardMode::RoundRobin, 3);
        let mut counts = [0usize; 3];
        for _ in 0..30 {
            counts[router.route(Path::new("x"), Path::new("."))] += 1;
        }
        assert_eq!(counts, [10, 10, 10]);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("bydir".parse::<ShardMode>().unwrap(), ShardMode::ByDir);
        assert_eq!("roundrobin".parse::<ShardMode>().unwrap(), ShardMode::RoundRobin);
        assert_eq!("hash".parse::<ShardMode>().unwrap(), ShardMode::Hash);
        assert!("random".parse::<ShardMode>().is_err());
        assert_eq!(ShardMode::default().to_string(), "bydir");
    }

    #[test]
    fn test_shard_set_writes_and_flushes() {
        let dir = tempdir().unwrap();
        let set = ShardSet::sharded(dir.path(), 3, ShardMode::RoundRobin, false)
            .unwrap()
            .with_flush_interval(2);

        for i in 0..6 {
            set.write(&PathBuf::from(format!("f{i}")), Path::new(".")).unwrap();
        }
        assert_eq!(set.emitted(), 6);
        assert_eq!(set.len(), 3);

        let summaries = set.finish().unwrap();
        assert_eq!(summaries.len(), 3);
        for (i, summary) in summaries.iter().enumerate() {
            assert_eq!(summary.records, 2);
            assert_eq!(summary.path, dir.path().join(shard_file_name(i)));
            let data = std::fs::read(&summary.path).unwrap();
            assert_eq!(data.iter().filter(|&&b| b == 0).count(), 2);
            assert_eq!(summary.bytes, data.len() as u64);
        }
        assert!(dir.path().join("shard_00002.nul").exists());
    }

    #[test]
    fn test_manifest_set() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.nul");
        let set = ShardSet::manifest(&path, false).unwrap();
        assert_eq!(set.write(Path::new("f1.txt"), Path::new(".")).unwrap(), 0);
        set.finish().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"f1.txt\0");
    }
}
