//! Error types for manifest-walker
//!
//! This module defines the error hierarchy for a crawl:
//! - Configuration errors (fatal, raised before any traversal)
//! - Output sink errors (fatal, they threaten manifest integrity)
//! - Worker pool errors (thread spawn failures, panics)
//! - Listing errors (absorbed per directory or per entry, only counted)
//!
//! Only configuration, output and worker errors ever reach the caller.
//! Listing errors degrade the result set instead of aborting the crawl.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for manifest-walker
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Output sink errors (ledger, manifest, shards)
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Root path could not be resolved to an absolute path
    #[error("Cannot resolve root '{path}': {reason}")]
    RootUnresolvable { path: PathBuf, reason: String },

    /// Root is missing or not a directory
    #[error("Root is not a directory: {path}")]
    RootNotDirectory { path: PathBuf },

    /// Neither a manifest nor a shard directory was given
    #[error("No output target: provide --out-manifest, or use --outdir with --shards")]
    MissingOutput,

    /// Both a manifest and shards were requested
    #[error("Conflicting output targets: --out-manifest cannot be combined with --shards")]
    ConflictingOutputs,

    /// Shards requested without a directory to put them in
    #[error("--outdir is required when using --shards")]
    MissingShardDir,

    /// Invalid worker count for a phase
    #[error("Invalid {phase} worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount {
        phase: &'static str,
        count: usize,
        max: usize,
    },

    /// Invalid queue capacity
    #[error("Invalid queue size {size}: must be at least {min}")]
    InvalidQueueSize { size: usize, min: usize },

    /// Output location could not be prepared
    #[error("Invalid output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },
}

/// Errors from output sinks. All of these are fatal.
#[derive(Error, Debug)]
pub enum OutputError {
    /// Failed to create or open an output file
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to append a record
    #[error("Failed to write to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to flush or sync buffered records
    #[error("Failed to flush '{path}': {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to stream the directory ledger back in
    #[error("Failed to read ledger '{path}': {source}")]
    LedgerRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A record contained the delimiter byte
    #[error("Path contains an embedded NUL byte: {path}")]
    EmbeddedNul { path: String },
}

/// Worker pool errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {pool}-{id} panicked")]
    Panicked { pool: &'static str, id: usize },

    /// Worker thread could not be started
    #[error("Failed to start worker {pool}-{id}: {reason}")]
    InitFailed {
        pool: &'static str,
        id: usize,
        reason: String,
    },

    /// Work queue disconnected while items were still being sent
    #[error("Work queue closed unexpectedly")]
    QueueClosed,

    /// Shared phase state still referenced after the pool was joined
    #[error("Workers of pool '{pool}' still hold shared state after shutdown")]
    StillRunning { pool: &'static str },
}

/// Failure to list a directory or classify one of its entries.
///
/// These never abort a crawl. The directory (or entry) is skipped and the
/// failure is counted.
#[derive(Error, Debug)]
pub enum ListError {
    /// Permission denied
    #[error("Permission denied: '{path}'")]
    PermissionDenied { path: PathBuf },

    /// Entry vanished between discovery and listing
    #[error("Path not found: '{path}'")]
    NotFound { path: PathBuf },

    /// Any other OS error
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ListError {
    /// Classify an I/O error raised while reading `path`
    pub fn from_io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::PermissionDenied => ListError::PermissionDenied { path },
            io::ErrorKind::NotFound => ListError::NotFound { path },
            _ => ListError::Io { path, source: err },
        }
    }

    /// Path the failure refers to
    pub fn path(&self) -> &std::path::Path {
        match self {
            ListError::PermissionDenied { path }
            | ListError::NotFound { path }
            | ListError::Io { path, .. } => path,
        }
    }
}

/// Result type alias for CrawlerError
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for OutputError
pub type OutputResult<T> = std::result::Result<T, OutputError>;
