//! Relative path helpers and the on-disk byte encoding of paths
//!
//! Every record written by the crawler is a path relative to the crawl
//! root, encoded as raw bytes. On Unix those are the `OsStr` bytes
//! verbatim, so names that are not valid UTF-8 survive a round trip
//! through the ledger. Elsewhere a lossy UTF-8 conversion is used.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Relative path that stands for the crawl root itself
pub const ROOT_MARKER: &str = ".";

/// True if `rel` is the root marker
pub fn is_root(rel: &Path) -> bool {
    rel.as_os_str() == ROOT_MARKER
}

/// Path of `abs` relative to `root`.
///
/// Returns `"."` for the root itself. Paths outside of `root` are
/// returned unchanged; the walker only ever builds children by joining
/// entry names onto directories under the root, so that does not happen
/// in practice.
pub fn relative_to(root: &Path, abs: &Path) -> PathBuf {
    match abs.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from(ROOT_MARKER),
        Ok(rel) => rel.to_path_buf(),
        Err(_) => abs.to_path_buf(),
    }
}

/// Absolute path of a relative record
pub fn absolute_from(root: &Path, rel: &Path) -> PathBuf {
    if is_root(rel) {
        root.to_path_buf()
    } else {
        root.join(rel)
    }
}

/// Join an entry name onto the relative path of its directory.
///
/// Files owned by the root get the bare entry name, never `./name`.
pub fn join_relative(dir_rel: &Path, name: &std::ffi::OsStr) -> PathBuf {
    if is_root(dir_rel) {
        PathBuf::from(name)
    } else {
        dir_rel.join(name)
    }
}

/// Encode a path as record bytes
#[cfg(unix)]
pub fn to_bytes(path: &Path) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(path.as_os_str().as_bytes())
}

/// Encode a path as record bytes
#[cfg(not(unix))]
pub fn to_bytes(path: &Path) -> Cow<'_, [u8]> {
    match path.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

/// Decode record bytes back into a path
#[cfg(unix)]
pub fn from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

/// Decode record bytes back into a path
#[cfg(not(unix))]
pub fn from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_relative_to() {
        let root = Path::new("/data/root");
        assert_eq!(relative_to(root, root), PathBuf::from("."));
        assert_eq!(relative_to(root, Path::new("/data/root/a")), PathBuf::from("a"));
        assert_eq!(
            relative_to(root, Path::new("/data/root/a/b")),
            Path::new("a").join("b")
        );
    }

    #[test]
    fn test_relative_never_starts_with_separator() {
        let root = Path::new("/data/root");
        let rel = relative_to(root, Path::new("/data/root/x/y"));
        assert!(!rel.has_root());
        assert!(!to_bytes(&rel).starts_with(b"/"));
    }

    #[test]
    fn test_join_relative_root_files() {
        assert_eq!(join_relative(Path::new("."), OsStr::new("f1.txt")), PathBuf::from("f1.txt"));
        assert_eq!(
            join_relative(Path::new("a"), OsStr::new("x.txt")),
            Path::new("a").join("x.txt")
        );
    }

    #[test]
    fn test_absolute_from() {
        let root = Path::new("/r");
        assert_eq!(absolute_from(root, Path::new(".")), PathBuf::from("/r"));
        assert_eq!(absolute_from(root, Path::new("a/b")), PathBuf::from("/r/a/b"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_bytes_survive() {
        let raw = b"caf\xe9/menu";
        let path = from_bytes(raw);
        assert_eq!(to_bytes(&path).as_ref(), raw);
    }
}
