//! Path collaborators for `path`-typed flags.
//!
//! Thin wrappers over `std::path`/`std::fs`. The one with real policy is
//! [`normalize`]: like `realpath`, it produces an absolute path with
//! symlinks and `.`/`..` components resolved and requires the path to
//! exist — a `path` flag naming a missing file is invalid input, caught
//! at parse time rather than first use.

use std::path::{Path, PathBuf};

/// Normalize `raw` into an absolute, symlink-free path. `None` when the
/// path does not exist or cannot be resolved.
pub fn normalize(raw: &str) -> Option<PathBuf> {
    if raw.is_empty() {
        return None;
    }
    std::fs::canonicalize(raw).ok()
}

pub fn exists(path: &Path) -> bool {
    path.exists()
}

pub fn is_file(path: &Path) -> bool {
    path.is_file()
}

/// True for a filesystem root ("/", or a drive root on Windows).
pub fn is_root(path: &Path) -> bool {
    path.has_root() && path.parent().is_none()
}

/// Final path element as UTF-8, `None` for roots or non-UTF-8 names.
pub fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: normalize resolves to an absolute existing path and
    /// fails for missing ones.
    #[test]
    fn normalize_requires_existence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("data.txt");
        std::fs::write(&file, b"x").expect("write");

        let normalized = normalize(file.to_str().unwrap()).expect("exists");
        assert!(normalized.is_absolute());
        assert!(exists(&normalized));
        assert!(is_file(&normalized));

        let missing = dir.path().join("nope.txt");
        assert!(normalize(missing.to_str().unwrap()).is_none());
        assert!(normalize("").is_none());
    }

    /// Invariant: a relative path normalizes through the current
    /// directory to the same place as its absolute spelling.
    #[test]
    fn normalize_resolves_relative_paths() {
        let cwd = std::env::current_dir().expect("cwd");
        let via_relative = normalize(".").expect("cwd exists");
        let via_absolute = normalize(cwd.to_str().unwrap()).expect("cwd exists");
        assert_eq!(via_relative, via_absolute);
    }

    /// Invariant: walking parents from any normalized path terminates at
    /// a root that still exists and is not a file.
    #[test]
    fn parent_walk_reaches_root() {
        let mut path = normalize(".").expect("cwd exists");
        while !is_root(&path) {
            let parent = path.parent().expect("non-root has a parent");
            assert!(exists(parent));
            path = parent.to_path_buf();
        }
        assert!(is_root(&path));
        assert!(!is_file(&path));
        assert_eq!(file_name(&path), None);
    }

    #[test]
    fn file_name_returns_last_element() {
        assert_eq!(file_name(Path::new("/usr/bin/prog")), Some("prog"));
        assert_eq!(file_name(Path::new("prog")), Some("prog"));
    }
}
