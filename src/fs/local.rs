//! [`DirLister`] backed by the local filesystem through `std::fs`

use super::types::{DirEntryInfo, EntryKind};
use super::{DirLister, Entries};
use crate::error::ListError;
use std::io;
use std::path::{Path, PathBuf};

/// Lists directories with `std::fs::read_dir`.
///
/// Entry types come from the directory entry itself (`d_type` on most
/// Unix filesystems) so symlinks are never followed while classifying.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    /// Create a new local lister
    pub fn new() -> Self {
        Self
    }
}

impl DirLister for LocalFs {
    fn read_dir<'a>(&'a self, dir: &Path) -> Result<Entries<'a>, ListError> {
        let iter = std::fs::read_dir(dir).map_err(|e| ListError::from_io(dir, e))?;
        let dir = dir.to_path_buf();

        Ok(Box::new(iter.map(move |entry| {
            let entry = entry.map_err(|e| ListError::from_io(&dir, e))?;
            let kind = entry
                .file_type()
                .map(EntryKind::from_file_type)
                .map_err(|e| ListError::from_io(entry.path(), e))?;
            Ok(DirEntryInfo::new(entry.file_name(), kind))
        })))
    }

    fn resolves_to_dir(&self, path: &Path) -> bool {
        std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn listing(dir: &Path) -> BTreeMap<String, EntryKind> {
        LocalFs::new()
            .read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap())
            .map(|e| (e.name.to_string_lossy().into_owned(), e.kind))
            .collect()
    }

    #[test]
    fn test_lists_immediate_children_only() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"b").unwrap();

        let entries = listing(dir.path());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["a.txt"], EntryKind::File);
        assert_eq!(entries["sub"], EntryKind::Directory);
    }

    #[test]
    fn test_missing_directory_is_list_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        match LocalFs::new().read_dir(&missing) {
            Err(ListError::NotFound { path }) => assert_eq!(path, missing),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("listing a missing directory succeeded"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_target_resolution() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::fs::write(dir.path().join("file"), b"x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("to_dir")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("file"), dir.path().join("to_file")).unwrap();

        let entries = listing(dir.path());
        assert_eq!(entries["to_dir"], EntryKind::Symlink);
        assert_eq!(entries["to_file"], EntryKind::Symlink);

        let fs = LocalFs::new();
        assert!(fs.resolves_to_dir(&dir.path().join("to_dir")));
        assert!(!fs.resolves_to_dir(&dir.path().join("to_file")));
        assert!(!fs.resolves_to_dir(&dir.path().join("dangling")));
    }
}
