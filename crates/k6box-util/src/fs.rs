//! Filesystem helpers shared by the cache layout, the native engine's
//! scratch module directory, and the launcher's atomic-rename step.

use std::path::{Path, PathBuf};

use crate::error::UtilError;

/// Create a directory and all parent directories if they do not exist.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), UtilError> {
    std::fs::create_dir_all(path).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Atomically place `src` at `dest`: write-then-rename, never a partial
/// file visible at `dest` (§4.9 step 4 "atomically placed").
///
/// `src` and `dest` must be on the same filesystem for the rename to be
/// atomic; both the bin-dir cache path and its containing scratch file are
/// chosen to guarantee this.
///
/// # Errors
/// Returns an error if the parent directory cannot be created or the
/// rename fails.
pub fn place_atomically(src: &Path, dest: &Path) -> Result<(), UtilError> {
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    std::fs::rename(src, dest).map_err(|source| UtilError::Io {
        path: dest.display().to_string(),
        source,
    })
}

/// Remove a file if present. No error if it is already absent.
///
/// # Errors
/// Returns an error if the file exists but cannot be removed.
pub fn remove_file_if_exists(path: &Path) -> Result<(), UtilError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UtilError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Remove a directory and all its contents. No error if the directory is absent.
///
/// # Errors
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<(), UtilError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UtilError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Join a relative import specifier against the directory containing the
/// file that imported it, matching Node-style relative resolution used by
/// the script analyser (§4.2).
#[must_use]
pub fn join_relative(including_file: &Path, spec: &str) -> PathBuf {
    let base = including_file.parent().unwrap_or_else(|| Path::new("."));
    base.join(spec)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn ensure_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b").join("c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn ensure_dir_existing_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        ensure_dir(tmp.path()).unwrap();
    }

    #[test]
    fn place_atomically_moves_file() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("scratch.bin");
        let dest = tmp.path().join("bin").join("k6");
        fs::write(&src, b"binary contents").unwrap();

        place_atomically(&src, &dest).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"binary contents");
    }

    #[test]
    fn place_atomically_overwrites_existing_dest() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("scratch.bin");
        let dest = tmp.path().join("k6");
        fs::write(&dest, b"old").unwrap();
        fs::write(&src, b"new").unwrap();

        place_atomically(&src, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn remove_dir_all_if_exists_removes() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("target");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("file.txt"), b"x").unwrap();

        remove_dir_all_if_exists(&dir).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn remove_dir_all_if_exists_absent_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        remove_dir_all_if_exists(&tmp.path().join("nonexistent")).unwrap();
    }

    #[test]
    fn remove_file_if_exists_absent_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        remove_file_if_exists(&tmp.path().join("nonexistent.bin")).unwrap();
    }

    #[test]
    fn join_relative_resolves_against_including_dir() {
        let including = Path::new("/scripts/a.js");
        let joined = join_relative(including, "./lib/b.js");
        assert_eq!(joined, Path::new("/scripts/./lib/b.js"));
    }
}
