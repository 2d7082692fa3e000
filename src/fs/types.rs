//! Directory entry types returned by a [`DirLister`](super::DirLister)
//!
//! Only the entry name and its type are captured. The crawler records
//! paths, never metadata.

use std::ffi::OsString;

/// Type of filesystem entry, as seen without following symlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link (target not inspected)
    Symlink,
    /// Device, FIFO, socket, or anything else
    Other,
}

impl EntryKind {
    /// Convert from a `std::fs::FileType` obtained without following links
    pub fn from_file_type(ft: std::fs::FileType) -> Self {
        if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Directory
        } else if ft.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }

    /// Check if this is a regular file
    pub fn is_file(&self) -> bool {
        *self == EntryKind::File
    }
}

/// One immediate child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    /// Entry name (a single path component)
    pub name: OsString,

    /// Entry type
    pub kind: EntryKind,
}

impl DirEntryInfo {
    /// Create a new entry
    pub fn new(name: impl Into<OsString>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}
