//! Configuration types for manifest-walker
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - The output target (single manifest or a directory of shards)

use crate::error::ConfigError;
use crate::output::ShardMode;
use clap::Parser;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Maximum reasonable worker count per phase
pub const MAX_WORKERS: usize = 1024;

/// Minimum queue capacity
pub const MIN_QUEUE_SIZE: usize = 1;

/// Two-phase directory-first parallel crawler
#[derive(Parser, Debug, Clone)]
#[command(
    name = "manifest-walker",
    version,
    about = "Two-phase dir-first parallel crawler for huge trees (NUL-separated, relative paths)",
    long_about = "Enumerates every directory and file beneath a root.\n\n\
                  Phase 1 discovers all directories in parallel and records them in a ledger.\n\
                  Phase 2 streams the ledger back, lists each directory's files in parallel,\n\
                  and writes them to a single manifest or to a set of shard files.",
    after_help = "EXAMPLES:\n    \
        manifest-walker --root /data --out-manifest files.nul\n    \
        manifest-walker --root /data --outdir shards --shards 16 --mode bydir\n    \
        manifest-walker --root /data --out-manifest files.nul --exclude .snapshot --exclude .git\n    \
        manifest-walker --root /data --outdir shards --shards 8 --workers1 64 --workers2 256"
)]
pub struct CliArgs {
    /// Source root (absolute path recommended)
    #[arg(long, value_name = "DIR")]
    pub root: PathBuf,

    /// Where to write discovered directories (NUL-separated, relative)
    #[arg(long, default_value = "dirs.nul", value_name = "FILE")]
    pub dirs_out: PathBuf,

    /// Single output file manifest (NUL-separated, relative)
    #[arg(long, value_name = "FILE")]
    pub out_manifest: Option<PathBuf>,

    /// Output directory for shard files (with --shards)
    #[arg(long, value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    /// Write directly into this many shard files
    #[arg(long, default_value_t = 0, value_name = "NUM")]
    pub shards: usize,

    /// Shard selection (hash of full path, roundrobin, or directory-based)
    #[arg(long, value_enum, default_value_t = ShardMode::ByDir)]
    pub mode: ShardMode,

    /// Threads for phase 1 (directory discovery)
    #[arg(long, default_value_t = 32, value_name = "NUM")]
    pub workers1: usize,

    /// Threads for phase 2 (file listing per directory)
    #[arg(long, default_value_t = 64, value_name = "NUM")]
    pub workers2: usize,

    /// Queue size (backpressure bound)
    #[arg(long, default_value_t = 200_000, value_name = "NUM")]
    pub maxq: usize,

    /// Exclude directory names (can be repeated)
    #[arg(long = "exclude", value_name = "NAME", action = clap::ArgAction::Append)]
    pub exclude: Vec<OsString>,

    /// Follow directory symlinks
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Append to existing manifest/shard files instead of truncating them
    #[arg(long)]
    pub append: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Where file records go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// One manifest file
    Manifest(PathBuf),

    /// `count` shard files inside `dir`
    Shards { dir: PathBuf, count: usize },
}

impl OutputTarget {
    /// Number of sinks
    pub fn shard_count(&self) -> usize {
        match self {
            OutputTarget::Manifest(_) => 1,
            OutputTarget::Shards { count, .. } => *count,
        }
    }

    /// Path shown to the user
    pub fn display_path(&self) -> &Path {
        match self {
            OutputTarget::Manifest(path) => path,
            OutputTarget::Shards { dir, .. } => dir,
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Absolute crawl root
    pub root: PathBuf,

    /// Directory ledger path
    pub ledger_path: PathBuf,

    /// File record destination
    pub output: OutputTarget,

    /// Shard selection policy
    pub mode: ShardMode,

    /// Phase-1 worker count
    pub discovery_workers: usize,

    /// Phase-2 worker count
    pub listing_workers: usize,

    /// Capacity of each phase's work queue
    pub queue_capacity: usize,

    /// Directory names never recorded nor entered
    pub excludes: HashSet<OsString>,

    /// Follow directory symlinks in phase 1
    pub follow_symlinks: bool,

    /// Append to existing outputs
    pub append: bool,

    /// Show progress indicator
    pub show_progress: bool,
}

impl CrawlConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let root = resolve_root(&args.root)?;

        let output = match (args.out_manifest, args.outdir, args.shards) {
            (Some(_), _, n) if n > 0 => return Err(ConfigError::ConflictingOutputs),
            (Some(manifest), _, _) => OutputTarget::Manifest(manifest),
            (None, Some(dir), n) if n > 0 => OutputTarget::Shards { dir, count: n },
            (None, None, n) if n > 0 => return Err(ConfigError::MissingShardDir),
            (None, _, _) => return Err(ConfigError::MissingOutput),
        };

        validate_workers("phase 1", args.workers1)?;
        validate_workers("phase 2", args.workers2)?;

        if args.maxq < MIN_QUEUE_SIZE {
            return Err(ConfigError::InvalidQueueSize {
                size: args.maxq,
                min: MIN_QUEUE_SIZE,
            });
        }

        Ok(Self {
            root,
            ledger_path: args.dirs_out,
            output,
            mode: args.mode,
            discovery_workers: args.workers1,
            listing_workers: args.workers2,
            queue_capacity: args.maxq,
            excludes: args.exclude.into_iter().collect(),
            follow_symlinks: args.follow_symlinks,
            append: args.append,
            show_progress: !args.quiet,
        })
    }

    /// Minimal configuration for a manifest crawl, as used by tests and
    /// library callers
    pub fn manifest(root: impl AsRef<Path>, ledger: impl Into<PathBuf>, manifest: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Ok(Self {
            root: resolve_root(root.as_ref())?,
            ledger_path: ledger.into(),
            output: OutputTarget::Manifest(manifest.into()),
            mode: ShardMode::ByDir,
            discovery_workers: 4,
            listing_workers: 8,
            queue_capacity: 1024,
            excludes: HashSet::new(),
            follow_symlinks: false,
            append: false,
            show_progress: false,
        })
    }

    /// Switch to `count` shard files in `dir`
    pub fn with_shards(mut self, dir: impl Into<PathBuf>, count: usize, mode: ShardMode) -> Self {
        self.output = OutputTarget::Shards {
            dir: dir.into(),
            count: count.max(1),
        };
        self.mode = mode;
        self
    }

    /// Exclude a directory name
    pub fn exclude(mut self, name: impl Into<OsString>) -> Self {
        self.excludes.insert(name.into());
        self
    }

    /// Set worker counts and queue capacity
    pub fn with_workers(mut self, discovery: usize, listing: usize, queue_capacity: usize) -> Self {
        self.discovery_workers = discovery.max(1);
        self.listing_workers = listing.max(1);
        self.queue_capacity = queue_capacity.max(MIN_QUEUE_SIZE);
        self
    }

    /// Follow directory symlinks
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Create the parent directories of the ledger and the outputs
    pub fn prepare_outputs(&self) -> Result<(), ConfigError> {
        let mut dirs: Vec<&Path> = Vec::new();
        if let Some(parent) = self.ledger_path.parent() {
            dirs.push(parent);
        }
        match &self.output {
            OutputTarget::Manifest(path) => {
                if let Some(parent) = path.parent() {
                    dirs.push(parent);
                }
            }
            OutputTarget::Shards { dir, .. } => dirs.push(dir),
        }

        for dir in dirs.into_iter().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::InvalidOutputPath {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

fn resolve_root(root: &Path) -> Result<PathBuf, ConfigError> {
    let absolute = std::path::absolute(root).map_err(|e| ConfigError::RootUnresolvable {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;

    if !absolute.is_dir() {
        return Err(ConfigError::RootNotDirectory { path: absolute });
    }
    Ok(absolute)
}

fn validate_workers(phase: &'static str, count: usize) -> Result<(), ConfigError> {
    if count == 0 || count > MAX_WORKERS {
        return Err(ConfigError::InvalidWorkerCount {
            phase,
            count,
            max: MAX_WORKERS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> CliArgs {
        let mut full = vec!["manifest-walker"];
        full.extend_from_slice(args);
        CliArgs::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--root", "/data", "--out-manifest", "m.nul"]);
        assert_eq!(args.dirs_out, PathBuf::from("dirs.nul"));
        assert_eq!(args.shards, 0);
        assert_eq!(args.mode, ShardMode::ByDir);
        assert_eq!(args.workers1, 32);
        assert_eq!(args.workers2, 64);
        assert_eq!(args.maxq, 200_000);
        assert!(!args.follow_symlinks);
        assert!(args.exclude.is_empty());
    }

    #[test]
    fn test_repeatable_exclude_and_mode() {
        let args = parse(&[
            "--root", "/data", "--outdir", "out", "--shards", "4", "--mode", "roundrobin",
            "--exclude", ".snapshot", "--exclude", ".git",
        ]);
        assert_eq!(args.mode, ShardMode::RoundRobin);
        assert_eq!(args.exclude, vec![OsString::from(".snapshot"), OsString::from(".git")]);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let result = CliArgs::try_parse_from(["manifest-walker", "--root", "/", "--mode", "random"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_target_validation() {
        let root = tempdir().unwrap();
        let r = root.path().to_str().unwrap();

        let config = CrawlConfig::from_args(parse(&["--root", r, "--out-manifest", "m.nul"])).unwrap();
        assert_eq!(config.output, OutputTarget::Manifest(PathBuf::from("m.nul")));
        assert_eq!(config.output.shard_count(), 1);

        let config =
            CrawlConfig::from_args(parse(&["--root", r, "--outdir", "o", "--shards", "3"])).unwrap();
        assert_eq!(config.output.shard_count(), 3);

        let err = CrawlConfig::from_args(parse(&["--root", r])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingOutput));

        let err = CrawlConfig::from_args(parse(&["--root", r, "--shards", "2"])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingShardDir));

        let err = CrawlConfig::from_args(parse(&[
            "--root", r, "--out-manifest", "m.nul", "--outdir", "o", "--shards", "2",
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingOutputs));

        // --outdir without --shards still needs a manifest
        let err = CrawlConfig::from_args(parse(&["--root", r, "--outdir", "o"])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingOutput));
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();

        let err = CrawlConfig::from_args(parse(&[
            "--root",
            file.to_str().unwrap(),
            "--out-manifest",
            "m.nul",
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::RootNotDirectory { .. }));

        let missing = dir.path().join("missing");
        let err = CrawlConfig::manifest(&missing, "d.nul", "m.nul").unwrap_err();
        assert!(matches!(err, ConfigError::RootNotDirectory { .. }));
    }

    #[test]
    fn test_worker_and_queue_limits() {
        let root = tempdir().unwrap();
        let r = root.path().to_str().unwrap();

        let err = CrawlConfig::from_args(parse(&["--root", r, "--out-manifest", "m", "--workers1", "0"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerCount { phase: "phase 1", .. }));

        let err = CrawlConfig::from_args(parse(&["--root", r, "--out-manifest", "m", "--workers2", "5000"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerCount { phase: "phase 2", .. }));

        let err = CrawlConfig::from_args(parse(&["--root", r, "--out-manifest", "m", "--maxq", "0"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidQueueSize { .. }));
    }

    #[test]
    fn test_root_is_absolute() {
        let root = tempdir().unwrap();
        let config = CrawlConfig::manifest(root.path(), "d.nul", "m.nul").unwrap();
        assert!(config.root.is_absolute());

        let config = config.exclude(".git").exclude(".git");
        assert_eq!(config.excludes.len(), 1);
        assert!(config.excludes.contains(std::ffi::OsStr::new(".git")));
    }

    #[test]
    fn test_prepare_outputs_creates_parents() {
        let root = tempdir().unwrap();
        let out = tempdir().unwrap();
        let config = CrawlConfig::manifest(
            root.path(),
            out.path().join("ledger/dirs.nul"),
            out.path().join("manifests/files.nul"),
        )
        .unwrap()
        .with_shards(out.path().join("shards"), 2, ShardMode::Hash);

        config.prepare_outputs().unwrap();
        assert!(out.path().join("ledger").is_dir());
        assert!(out.path().join("shards").is_dir());
        assert!(!out.path().join("manifests").exists());
    }
}
