//! Output sinks
//!
//! ```text
//!  phase 1 workers ──► LedgerWriter ──► dirs.nul
//!                                          │
//!                         LedgerReader ◄───┘
//!                              │
//!  phase 2 workers ──► ShardSet ──► ShardRouter ──► shard_00000.nul
//!                                               ├─► shard_00001.nul
//!                                               └─► ...
//! ```
//!
//! Every sink is a [`NulWriter`]: a buffered, append-only stream of
//! NUL-terminated relative paths.

pub mod ledger;
pub mod shard;
pub mod writer;

pub use ledger::{LedgerReader, LedgerWriter};
pub use shard::{hash_index, ShardMode, ShardRouter, ShardSet, ShardSummary};
pub use writer::NulWriter;
