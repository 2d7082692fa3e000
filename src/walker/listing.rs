//! Phase 2: per-directory file listing
//!
//! Workers pull relative directory paths (streamed from the ledger),
//! list each directory once, and write every regular file to a shard.
//! Symlinks are never followed here: a link to a file is not a regular
//! file at this directory level and is not emitted.

use crate::error::CrawlerError;
use crate::fs::DirLister;
use crate::output::ShardSet;
use crate::paths;
use crate::walker::pool::Job;
use crate::walker::queue::WorkQueue;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Counters for phase 2
#[derive(Debug, Default)]
pub struct ListingStats {
    /// Directories whose entries were read
    pub dirs_listed: AtomicU64,

    /// File records emitted
    pub files_emitted: AtomicU64,

    /// Directories that could not be listed
    pub list_errors: AtomicU64,

    /// Single entries that could not be read or classified
    pub entry_errors: AtomicU64,
}

impl ListingStats {
    /// Directories listed so far
    pub fn listed(&self) -> u64 {
        self.dirs_listed.load(Ordering::Relaxed)
    }

    /// Files emitted so far
    pub fn files(&self) -> u64 {
        self.files_emitted.load(Ordering::Relaxed)
    }
}

/// Phase-2 job: list one directory's files
pub struct ListingJob {
    root: PathBuf,
    fs: Arc<dyn DirLister>,
    shards: Arc<ShardSet>,
    stats: Arc<ListingStats>,
}

impl ListingJob {
    /// Create a listing job rooted at `root` (absolute)
    pub fn new(
        root: PathBuf,
        fs: Arc<dyn DirLister>,
        shards: Arc<ShardSet>,
        stats: Arc<ListingStats>,
    ) -> Self {
        Self {
            root,
            fs,
            shards,
            stats,
        }
    }
}

impl Job for ListingJob {
    type Item = PathBuf;

    fn run(&self, worker: usize, dir_rel: PathBuf, _queue: &WorkQueue<PathBuf>) -> Result<(), CrawlerError> {
        let dir_abs = paths::absolute_from(&self.root, &dir_rel);

        let entries = match self.fs.read_dir(&dir_abs) {
            Ok(entries) => entries,
            Err(e) => {
                self.stats.list_errors.fetch_add(1, Ordering::Relaxed);
                debug!(worker, path = %dir_abs.display(), error = %e, "Directory skipped");
                return Ok(());
            }
        };
        self.stats.dirs_listed.fetch_add(1, Ordering::Relaxed);

        let mut files = 0u64;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.stats.entry_errors.fetch_add(1, Ordering::Relaxed);
                    trace!(worker, path = %e.path().display(), error = %e, "Entry skipped");
                    continue;
                }
            };
            if !entry.kind.is_file() {
                continue;
            }

            let file_rel = paths::join_relative(&dir_rel, &entry.name);
            self.shards.write(&file_rel, &dir_rel)?;
            files += 1;
        }

        self.stats.files_emitted.fetch_add(files, Ordering::Relaxed);
        trace!(worker, dir = %dir_rel.display(), files, "Directory listed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFs;
    use crate::walker::pool::WorkerPool;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn test_lists_regular_files_only() {
        let root = tempdir().unwrap();
        let out = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("a/nested")).unwrap();
        std::fs::write(root.path().join("f1.txt"), b"1").unwrap();
        std::fs::write(root.path().join("a/x.txt"), b"x").unwrap();
        std::fs::write(root.path().join("a/nested/deep.txt"), b"d").unwrap();

        let manifest = out.path().join("manifest.nul");
        let shards = Arc::new(ShardSet::manifest(&manifest, false).unwrap());
        let stats = Arc::new(ListingStats::default());
        let job = ListingJob::new(
            root.path().to_path_buf(),
            Arc::new(LocalFs::new()),
            Arc::clone(&shards),
            Arc::clone(&stats),
        );

        let queue = WorkQueue::new(2);
        let pool = WorkerPool::spawn("list", 3, &queue, Arc::new(job)).unwrap();
        // "a/nested" is not fed in, so its file must not appear
        for dir in [".", "a", "missing"] {
            queue.push(PathBuf::from(dir)).unwrap();
        }
        queue.join();
        pool.shutdown().unwrap();

        assert_eq!(stats.files(), 2);
        assert_eq!(stats.listed(), 2);
        assert_eq!(stats.list_errors.load(Ordering::Relaxed), 1);

        let shards = Arc::try_unwrap(shards).ok().unwrap();
        shards.finish().unwrap();

        let data = std::fs::read(&manifest).unwrap();
        let mut records: Vec<Vec<u8>> = data
            .split(|&b| b == 0)
            .filter(|r| !r.is_empty())
            .map(<[u8]>::to_vec)
            .collect();
        records.sort();
        let nested = Path::new("a").join("x.txt");
        assert_eq!(
            records,
            vec![paths::to_bytes(&nested).into_owned(), b"f1.txt".to_vec()]
        );
    }
}
