//! Two-phase parallel crawler
//!
//! Phase 1 discovers every directory under the root and appends it to
//! the ledger. Phase 2 streams the ledger back and lists each directory's
//! regular files into the output shards. Each phase runs its own worker
//! pool over a bounded queue and is fully drained before the next starts.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │    CrawlCoordinator     │
//!                     └───────────┬─────────────┘
//!                                 │
//!          ┌──────────────────────┴──────────────────────┐
//!          │ phase 1                                     │ phase 2
//!   ┌──────▼──────┐                               ┌──────▼──────┐
//!   │  WorkQueue  │◄──┐                           │  WorkQueue  │◄── LedgerReader
//!   │  (bounded)  │   │ subdirs                   │  (bounded)  │
//!   └──────┬──────┘   │ (inline when full)        └──────┬──────┘
//!          │          │                                  │
//!   ┌──────▼──────────┴┐                          ┌──────▼──────┐
//!   │ discover-0..N    │── LedgerWriter           │ list-0..M   │── ShardSet
//!   └──────────────────┘                          └─────────────┘
//! ```

pub mod coordinator;
pub mod discovery;
pub mod listing;
pub mod pool;
pub mod queue;

pub use coordinator::{CrawlCoordinator, CrawlProgress, CrawlResult, Phase};
pub use pool::{Job, WorkerPool};
pub use queue::{Message, QueueStats, WorkQueue};
