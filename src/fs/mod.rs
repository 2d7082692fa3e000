//! Filesystem access
//!
//! The walker never touches `std::fs` directly. It goes through the
//! [`DirLister`] trait, which lists the immediate entries of a directory
//! and classifies each one without following symlinks.
//!
//! # Error model
//!
//! ```text
//! read_dir(dir) ──► Err(ListError)          whole directory skipped
//!       │
//!       └─► Ok(entries) ──► Err(ListError)  that entry skipped
//!                     └───► Ok(DirEntryInfo)
//! ```
//!
//! Both kinds of failure are recoverable; callers count and continue.

mod local;
pub mod types;

pub use local::LocalFs;
pub use types::{DirEntryInfo, EntryKind};

use crate::error::ListError;
use std::io;
use std::path::{Path, PathBuf};

/// Streaming iterator over the entries of one directory
pub type Entries<'a> = Box<dyn Iterator<Item = Result<DirEntryInfo, ListError>> + 'a>;

/// Directory listing capability shared by all worker threads
pub trait DirLister: Send + Sync {
    /// List the immediate entries of `dir`
    fn read_dir<'a>(&'a self, dir: &Path) -> Result<Entries<'a>, ListError>;

    /// True if `path` (following symlinks) is a directory
    fn resolves_to_dir(&self, path: &Path) -> bool;

    /// Resolve `path` to its canonical form, following every symlink
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}
