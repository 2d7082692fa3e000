//! Phase 1: directory discovery
//!
//! Walks the whole directory tree (directories only) with a pool of
//! workers. Each worker:
//! - Pulls an absolute directory path from the work queue
//! - Lists its immediate children
//! - Appends every qualifying subdirectory to the ledger
//! - Pushes that subdirectory back onto the queue for expansion
//!
//! A subdirectory qualifies if its name is not excluded and it is a real
//! directory, or a symlink to one when following symlinks.
//!
//! When the queue is full the worker keeps the subdirectory on a local
//! stack and expands it itself before taking new work. Workers never block
//! on their own queue. Memory for directories in flight is the queue
//! capacity plus whatever each worker holds on its overflow stack; in the
//! worst case that stack grows with depth times fan-out.

use crate::error::{CrawlerError, ListError};
use crate::fs::{DirLister, EntryKind};
use crate::output::LedgerWriter;
use crate::paths;
use crate::walker::pool::Job;
use crate::walker::queue::WorkQueue;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Counters for phase 1
#[derive(Debug, Default)]
pub struct DiscoveryStats {
    /// Directories appended to the ledger (root included)
    pub dirs_discovered: AtomicU64,

    /// Directories whose entries were read
    pub dirs_scanned: AtomicU64,

    /// Directories that could not be listed
    pub list_errors: AtomicU64,

    /// Single entries that could not be read or classified
    pub entry_errors: AtomicU64,

    /// Subdirectories expanded by the discovering worker because the
    /// queue was full
    pub inline_expanded: AtomicU64,

    /// Directory symlinks skipped because they point back up the tree
    pub symlink_loops: AtomicU64,
}

impl DiscoveryStats {
    fn record_discovered(&self) {
        self.dirs_discovered.fetch_add(1, Ordering::Relaxed);
    }

    fn record_scanned(&self) {
        self.dirs_scanned.fetch_add(1, Ordering::Relaxed);
    }

    fn record_list_error(&self) {
        self.list_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_entry_error(&self) {
        self.entry_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_inline(&self) {
        self.inline_expanded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_loop(&self) {
        self.symlink_loops.fetch_add(1, Ordering::Relaxed);
    }

    /// Directories discovered so far
    pub fn discovered(&self) -> u64 {
        self.dirs_discovered.load(Ordering::Relaxed)
    }

    /// Directories scanned so far
    pub fn scanned(&self) -> u64 {
        self.dirs_scanned.load(Ordering::Relaxed)
    }
}

/// Traversal policy for phase 1
#[derive(Debug, Clone)]
pub struct DiscoveryPolicy {
    /// Directory names that are never recorded nor entered
    pub excludes: HashSet<OsString>,

    /// Follow symlinks that point at directories
    pub follow_symlinks: bool,
}

/// Phase-1 job: expand one directory
pub struct DiscoveryJob {
    root: PathBuf,
    policy: DiscoveryPolicy,
    fs: Arc<dyn DirLister>,
    ledger: Arc<LedgerWriter>,
    stats: Arc<DiscoveryStats>,
}

impl DiscoveryJob {
    /// Create a discovery job rooted at `root` (absolute)
    pub fn new(
        root: PathBuf,
        policy: DiscoveryPolicy,
        fs: Arc<dyn DirLister>,
        ledger: Arc<LedgerWriter>,
        stats: Arc<DiscoveryStats>,
    ) -> Self {
        Self {
            root,
            policy,
            fs,
            ledger,
            stats,
        }
    }

    /// Record the root itself as `"."`. Must run before any worker starts.
    pub fn record_root(&self) -> Result<(), CrawlerError> {
        self.ledger.append(Path::new(paths::ROOT_MARKER))?;
        self.stats.record_discovered();
        Ok(())
    }

    /// Expand one directory.
    ///
    /// Each qualifying subdirectory is handed to the queue as soon as it is
    /// found; if the queue is full it goes on `pending` instead.
    fn expand(
        &self,
        worker: usize,
        dir: &Path,
        queue: &WorkQueue<PathBuf>,
        pending: &mut Vec<PathBuf>,
    ) -> Result<(), CrawlerError> {
        let entries = match self.fs.read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                self.stats.record_list_error();
                debug!(worker, path = %dir.display(), error = %e, "Directory skipped");
                return Ok(());
            }
        };
        self.stats.record_scanned();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.stats.record_entry_error();
                    trace!(worker, path = %e.path().display(), error = %e, "Entry skipped");
                    continue;
                }
            };

            if self.policy.excludes.contains(&entry.name) {
                continue;
            }

            let child = dir.join(&entry.name);
            let is_dir = match entry.kind {
                EntryKind::Directory => true,
                EntryKind::Symlink if self.policy.follow_symlinks => self.follow_link(dir, &child),
                _ => false,
            };
            if !is_dir {
                continue;
            }

            self.ledger.append(&paths::relative_to(&self.root, &child))?;
            self.stats.record_discovered();

            if let Err(child) = queue.try_push(child) {
                self.stats.record_inline();
                pending.push(child);
            }
        }

        Ok(())
    }

    /// Decide whether a directory symlink should be walked.
    ///
    /// Links to non-directories are ignored. A link is skipped when its
    /// target is a physical ancestor of the directory being scanned, or the
    /// same directory as any logical ancestor on the path from the root.
    /// The second check catches cycles that pass through several links.
    fn follow_link(&self, dir: &Path, link: &Path) -> bool {
        if !self.fs.resolves_to_dir(link) {
            return false;
        }

        let target = match self.fs.canonicalize(link) {
            Ok(target) => target,
            Err(e) => {
                self.stats.record_entry_error();
                trace!(error = %ListError::from_io(link, e), "Symlink skipped");
                return false;
            }
        };

        let mut ancestors = dir.ancestors().take_while(|a| a.starts_with(&self.root));
        let looped = ancestors.any(|ancestor| match self.fs.canonicalize(ancestor) {
            Ok(here) => here.starts_with(&target),
            Err(_) => false,
        });

        if looped {
            self.stats.record_loop();
            debug!(link = %link.display(), target = %target.display(), "Symlink loop skipped");
        }
        !looped
    }
}

impl Job for DiscoveryJob {
    type Item = PathBuf;

    fn run(&self, worker: usize, dir: PathBuf, queue: &WorkQueue<PathBuf>) -> Result<(), CrawlerError> {
        // Local depth-first stack for subdirectories the queue had no room for
        let mut pending = vec![dir];

        while let Some(dir) = pending.pop() {
            self.expand(worker, &dir, queue, &mut pending)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFs;
    use crate::output::LedgerReader;
    use crate::walker::pool::WorkerPool;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn discover(root: &Path, excludes: &[&str], workers: usize, capacity: usize) -> (BTreeSet<PathBuf>, Arc<DiscoveryStats>) {
        let ledger_dir = tempdir().unwrap();
        let ledger_path = ledger_dir.path().join("dirs.nul");
        let ledger = Arc::new(LedgerWriter::create(&ledger_path).unwrap());
        let stats = Arc::new(DiscoveryStats::default());

        let job = DiscoveryJob::new(
            root.to_path_buf(),
            DiscoveryPolicy {
                excludes: excludes.iter().map(OsString::from).collect(),
                follow_symlinks: false,
            },
            Arc::new(LocalFs::new()),
            Arc::clone(&ledger),
            Arc::clone(&stats),
        );
        job.record_root().unwrap();

        let queue = WorkQueue::new(capacity);
        queue.push(root.to_path_buf()).unwrap();
        let pool = WorkerPool::spawn("discover", workers, &queue, Arc::new(job)).unwrap();
        queue.join();
        pool.shutdown().unwrap();
        ledger.finish().unwrap();

        let records: Vec<PathBuf> = LedgerReader::open(&ledger_path)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        let set: BTreeSet<PathBuf> = records.iter().cloned().collect();
        assert_eq!(set.len(), records.len(), "duplicate ledger entries");
        (set, stats)
    }

    #[test]
    fn test_excluded_directories_are_invisible() {
        let root = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("a")).unwrap();
        std::fs::create_dir_all(root.path().join("b/inner")).unwrap();
        std::fs::write(root.path().join("a/x.txt"), b"x").unwrap();

        let (dirs, stats) = discover(root.path(), &["b"], 2, 8);
        let expected: BTreeSet<PathBuf> = [".", "a"].iter().map(PathBuf::from).collect();
        assert_eq!(dirs, expected);
        assert_eq!(stats.discovered(), 2);
    }

    #[test]
    fn test_wide_level_with_tiny_queue() {
        let root = tempdir().unwrap();
        for i in 0..40 {
            std::fs::create_dir_all(root.path().join(format!("d{i}/sub"))).unwrap();
        }

        let (dirs, stats) = discover(root.path(), &[], 2, 1);
        assert_eq!(dirs.len(), 1 + 40 * 2);
        assert!(dirs.contains(&Path::new("d7").join("sub")));
        assert!(stats.inline_expanded.load(Ordering::Relaxed) > 0);
        assert_eq!(stats.scanned(), 81);
    }
}
