//! Crawl coordinator - orchestrates both phases
//!
//! The coordinator is responsible for:
//! - Recording the root and seeding phase 1
//! - Running each phase's worker pool to exhaustion, then shutting it down
//! - Streaming the ledger into phase 2
//! - Progress reporting and final statistics

use crate::config::{CrawlConfig, OutputTarget};
use crate::error::{Result, WorkerError};
use crate::fs::{DirLister, LocalFs};
use crate::output::{LedgerReader, LedgerWriter, ShardSet, ShardSummary};
use crate::progress::ProgressReporter;
use crate::walker::discovery::{DiscoveryJob, DiscoveryPolicy, DiscoveryStats};
use crate::walker::listing::{ListingJob, ListingStats};
use crate::walker::pool::WorkerPool;
use crate::walker::queue::WorkQueue;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// How often progress is refreshed while waiting on a phase
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Crawl phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Phase 1
    Discovery,
    /// Phase 2
    Listing,
}

impl Phase {
    /// Short label for progress output
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Discovery => "PHASE1 dirs",
            Phase::Listing => "PHASE2 files",
        }
    }
}

/// Result of a completed crawl
#[derive(Debug)]
pub struct CrawlResult {
    /// Directories recorded in the ledger (root included)
    pub dirs_discovered: u64,

    /// Directories listed in phase 2
    pub dirs_listed: u64,

    /// File records written across all shards
    pub files_emitted: u64,

    /// Directories that could not be listed (both phases)
    pub list_errors: u64,

    /// Entries that could not be read (both phases)
    pub entry_errors: u64,

    /// Subdirectories expanded inline because the phase-1 queue was full
    pub inline_expanded: u64,

    /// Directory symlinks skipped to avoid loops
    pub symlink_loops: u64,

    /// Ledger file
    pub ledger_path: PathBuf,

    /// One entry per output sink
    pub shards: Vec<ShardSummary>,

    /// Time spent in phase 1
    pub discovery_duration: Duration,

    /// Time spent in phase 2
    pub listing_duration: Duration,
}

impl CrawlResult {
    /// Total time for both phases
    pub fn duration(&self) -> Duration {
        self.discovery_duration + self.listing_duration
    }

    /// Total bytes written to manifest/shards
    pub fn output_bytes(&self) -> u64 {
        self.shards.iter().map(|s| s.bytes).sum()
    }
}

/// Progress information for display
#[derive(Debug, Clone)]
pub struct CrawlProgress {
    /// Current phase
    pub phase: Phase,

    /// Directories discovered (phase 1) or listed (phase 2)
    pub dirs: u64,

    /// Files emitted
    pub files: u64,

    /// Items waiting in the queue
    pub queue_size: usize,

    /// Items pushed but not finished
    pub outstanding: u64,

    /// Elapsed time in this phase
    pub elapsed: Duration,
}

impl CrawlProgress {
    /// Items handled per second in the current phase
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        let count = match self.phase {
            Phase::Discovery => self.dirs,
            Phase::Listing => self.files,
        };
        if secs > 0.0 {
            count as f64 / secs
        } else {
            0.0
        }
    }
}

/// Coordinates the two-phase crawl
pub struct CrawlCoordinator {
    /// Configuration
    config: Arc<CrawlConfig>,

    /// Filesystem access
    fs: Arc<dyn DirLister>,
}

impl CrawlCoordinator {
    /// Create a coordinator over the local filesystem
    pub fn new(config: CrawlConfig) -> Self {
        Self::with_lister(config, Arc::new(LocalFs::new()))
    }

    /// Create a coordinator with a custom filesystem implementation
    pub fn with_lister(config: CrawlConfig, fs: Arc<dyn DirLister>) -> Self {
        Self {
            config: Arc::new(config),
            fs,
        }
    }

    /// Run both phases to completion
    pub fn run(&self, progress: Option<&ProgressReporter>) -> Result<CrawlResult> {
        self.config.prepare_outputs()?;

        info!(
            root = %self.config.root.display(),
            workers1 = self.config.discovery_workers,
            workers2 = self.config.listing_workers,
            shards = self.config.output.shard_count(),
            mode = %self.config.mode,
            "Starting crawl"
        );

        let started = Instant::now();
        let discovery = self.discover(progress)?;
        let discovery_duration = started.elapsed();

        info!(
            dirs = discovery.discovered(),
            elapsed_secs = discovery_duration.as_secs_f64(),
            "Directory discovery complete"
        );

        let started = Instant::now();
        let (listing, shards) = self.list(progress)?;
        let listing_duration = started.elapsed();

        let files = listing.files();
        let secs = listing_duration.as_secs_f64();
        info!(
            files,
            elapsed_secs = secs,
            files_per_sec = if secs > 0.0 { files as f64 / secs } else { 0.0 },
            "File listing complete"
        );

        let list_errors = discovery.list_errors.load(Ordering::Relaxed)
            + listing.list_errors.load(Ordering::Relaxed);
        if list_errors > 0 {
            warn!(list_errors, "Some directories could not be read and were skipped");
        }

        Ok(CrawlResult {
            dirs_discovered: discovery.discovered(),
            dirs_listed: listing.listed(),
            files_emitted: files,
            list_errors,
            entry_errors: discovery.entry_errors.load(Ordering::Relaxed)
                + listing.entry_errors.load(Ordering::Relaxed),
            inline_expanded: discovery.inline_expanded.load(Ordering::Relaxed),
            symlink_loops: discovery.symlink_loops.load(Ordering::Relaxed),
            ledger_path: self.config.ledger_path.clone(),
            shards,
            discovery_duration,
            listing_duration,
        })
    }

    /// Phase 1: discover every directory into the ledger
    fn discover(&self, progress: Option<&ProgressReporter>) -> Result<Arc<DiscoveryStats>> {
        let config = &self.config;
        let ledger = Arc::new(LedgerWriter::create(&config.ledger_path)?);
        let stats = Arc::new(DiscoveryStats::default());

        let job = DiscoveryJob::new(
            config.root.clone(),
            DiscoveryPolicy {
                excludes: config.excludes.clone(),
                follow_symlinks: config.follow_symlinks,
            },
            Arc::clone(&self.fs),
            Arc::clone(&ledger),
            Arc::clone(&stats),
        );
        job.record_root()?;

        let queue = WorkQueue::new(config.queue_capacity);
        queue.push(config.root.clone())?;

        let pool = WorkerPool::spawn("discover", config.discovery_workers, &queue, Arc::new(job))?;
        let started = Instant::now();
        wait_for_completion(&queue, || {
            if let Some(p) = progress {
                p.update(&CrawlProgress {
                    phase: Phase::Discovery,
                    dirs: stats.discovered(),
                    files: 0,
                    queue_size: queue.len(),
                    outstanding: queue.outstanding(),
                    elapsed: started.elapsed(),
                });
            }
        });
        pool.shutdown()?;

        ledger.finish()?;
        Ok(stats)
    }

    /// Phase 2: stream the ledger and list every directory's files
    fn list(
        &self,
        progress: Option<&ProgressReporter>,
    ) -> Result<(Arc<ListingStats>, Vec<ShardSummary>)> {
        let config = &self.config;
        let shards = Arc::new(match &config.output {
            OutputTarget::Manifest(path) => ShardSet::manifest(path, config.append)?,
            OutputTarget::Shards { dir, count } => {
                ShardSet::sharded(dir, *count, config.mode, config.append)?
            }
        });
        let stats = Arc::new(ListingStats::default());
        let ledger = LedgerReader::open(&config.ledger_path)?;

        let job = ListingJob::new(
            config.root.clone(),
            Arc::clone(&self.fs),
            Arc::clone(&shards),
            Arc::clone(&stats),
        );

        let queue = WorkQueue::new(config.queue_capacity);
        let pool = WorkerPool::spawn("list", config.listing_workers, &queue, Arc::new(job))?;

        let started = Instant::now();
        let report = || {
            if let Some(p) = progress {
                p.update(&CrawlProgress {
                    phase: Phase::Listing,
                    dirs: stats.listed(),
                    files: stats.files(),
                    queue_size: queue.len(),
                    outstanding: queue.outstanding(),
                    elapsed: started.elapsed(),
                });
            }
        };

        // Feed the queue from the ledger; push blocks while the queue is full
        let mut read_error = None;
        let mut fed = 0u64;
        for record in ledger {
            match record {
                Ok(dir_rel) => queue.push(dir_rel)?,
                Err(e) => {
                    read_error = Some(e);
                    break;
                }
            }
            fed += 1;
            if pool.has_failed() {
                break;
            }
            if fed % 4096 == 0 {
                report();
            }
        }

        wait_for_completion(&queue, report);
        pool.shutdown()?;
        if let Some(e) = read_error {
            return Err(e.into());
        }

        // Workers are joined, so this is the last reference
        let shards = Arc::try_unwrap(shards)
            .map_err(|_| WorkerError::StillRunning { pool: "list" })?
            .finish()?;
        Ok((stats, shards))
    }
}

/// Wait for a queue to drain, calling `tick` between checks
fn wait_for_completion<T>(queue: &WorkQueue<T>, tick: impl Fn()) {
    while !queue.join_timeout(PROGRESS_INTERVAL) {
        tick();
    }
    tick();
}
