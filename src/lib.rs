//! manifest-walker - Two-Phase Directory-First Crawler
//!
//! Enumerates every directory and regular file beneath a root and writes
//! them as NUL-delimited, root-relative path records. Built for trees
//! with hundreds of millions of entries: directory and file records
//! are streamed through disk, never collected in memory.
//!
//! # Features
//!
//! - **Directory-First**: Phase 1 finds all directories and records them
//!   in an on-disk ledger before any file is listed.
//!
//! - **Bounded Queues**: Both phases use a fixed-capacity work queue.
//!   Phase 1 expands subdirectories inline on a per-worker stack when its
//!   queue is full, so producers never deadlock. That stack is the only
//!   unbounded part (depth times fan-out in the worst case).
//!
//! - **Sharded Output**: Files go to a single manifest or to N shard files,
//!   chosen by round-robin, a hash of the path, or a hash of the parent
//!   directory.
//!
//! - **Fault Tolerant**: Unreadable directories and entries are skipped and
//!   counted. Only output failures abort a crawl.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Phase 1: Discovery                          │
//! │  ┌──────────┐  ┌──────────┐         ┌──────────┐                 │
//! │  │discover-0│  │discover-1│   ...   │discover-N│                 │
//! │  └────┬─────┘  └────┬─────┘         └────┬─────┘                 │
//! │       └─────────────┼────────────────────┘                       │
//! │                     ▼                                            │
//! │            ┌──────────────────┐                                  │
//! │            │  Ledger (dirs)   │  ".\0a\0a/b\0..."                │
//! │            └────────┬─────────┘                                  │
//! └─────────────────────┼───────────────────────────────────────────┘
//!                       │ streamed
//! ┌─────────────────────▼───────────────────────────────────────────┐
//! │                      Phase 2: Listing                            │
//! │  ┌──────────┐  ┌──────────┐         ┌──────────┐                 │
//! │  │  list-0  │  │  list-1  │   ...   │  list-M  │                 │
//! │  └────┬─────┘  └────┬─────┘         └────┬─────┘                 │
//! │       └─────────────┼────────────────────┘                       │
//! │                     ▼                                            │
//! │      ┌─────────────────────────────────┐                         │
//! │      │ ShardRouter → shard_00000.nul … │                         │
//! │      └─────────────────────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Single manifest
//! manifest-walker --root /data --out-manifest files.nul
//!
//! # 16 shards, files grouped by parent directory
//! manifest-walker --root /data --outdir shards --shards 16 --mode bydir
//!
//! # Consume the output
//! xargs -0 -a files.nul -n 1000 stat --format=%s
//! ```

pub mod config;
pub mod error;
pub mod fs;
pub mod output;
pub mod paths;
pub mod progress;
pub mod walker;

pub use config::{CliArgs, CrawlConfig, OutputTarget};
pub use error::{ConfigError, CrawlerError, OutputError, Result};
pub use output::ShardMode;
pub use walker::{CrawlCoordinator, CrawlResult};
