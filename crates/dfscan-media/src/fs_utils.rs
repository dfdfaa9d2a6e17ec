//! Filesystem utilities for atomic file replacement.
//!
//! Readers of progress and metadata files may poll while a worker is
//! rewriting them, so every write goes to a temporary file in the same
//! directory and is renamed over the destination.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{MediaError, MediaResult};

/// Atomically replace `path` with `bytes`, creating parent directories.
pub fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> MediaResult<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| MediaError::Io(e.error))?;
    Ok(())
}

/// Atomically replace `path` with the pretty-printed JSON of `value`.
pub fn write_json_atomic<T: Serialize>(path: impl AsRef<Path>, value: &T) -> MediaResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/progress.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        // no temp files left behind
        assert_eq!(std::fs::read_dir(dir.path().join("nested")).unwrap().count(), 1);
    }

    #[test]
    fn test_write_json_atomic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("value.json");
        write_json_atomic(&path, &serde_json::json!({"progress": 42})).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["progress"], 42);
    }
}
