//! Whole-file atomic replacement.
//!
//! Every store write goes through the same protocol:
//!
//! 1. Serialize the complete new state.
//! 2. Write it to a sibling `<path>.tmp`.
//! 3. Rename over `<path>` (atomic on POSIX, same directory so no EXDEV).
//!
//! A failed write leaves the previous document untouched and removes the
//! `.tmp` file. There is no locking: one writer per store at a time is a
//! precondition the CI orchestration guarantees.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::{io_err, StoreError};

/// Indentation used by the hub's existing store documents.
const INDENT: &[u8] = b"    ";

/// `<path>.tmp`. Pure, no I/O.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.tmp", path.display()))
}

/// Serialize `value` as indented JSON and atomically replace `path`.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    write_bytes(path, &buf)
}

/// Atomically replace `path` with `bytes`.
pub(crate) fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    write_bytes_with_tmp(path, bytes, &tmp_path(path))
}

fn write_bytes_with_tmp(path: &Path, bytes: &[u8], tmp: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if let Err(e) = std::fs::write(tmp, bytes) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(tmp, e));
    }
    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn writes_four_space_indented_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db.json");
        write_json(&path, &serde_json::json!({"changes": ["a.csv"]})).unwrap();

        let disk = fs::read_to_string(&path).unwrap();
        assert_eq!(disk, "{\n    \"changes\": [\n        \"a.csv\"\n    ]\n}\n");
    }

    #[test]
    fn tmp_file_removed_after_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db.json");
        write_bytes(&path, b"{}").unwrap();
        assert!(!tmp_path(&path).exists(), ".tmp must be cleaned up");
    }

    #[test]
    fn creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".github").join("data-storage").join("db.json");
        write_bytes(&path, b"{}").unwrap();
        assert!(path.exists());
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();

        let path = readonly_dir.join("db.json");
        fs::write(&path, "{\"original\": true}").unwrap();

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp = tmp_dir.path().join("db.json.tmp");
        let result = write_bytes_with_tmp(&path, b"{}", &tmp);

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        // Running as root bypasses directory permissions; only assert when the
        // rename was actually refused.
        if result.is_err() {
            assert_eq!(fs::read_to_string(&path).unwrap(), "{\"original\": true}");
            assert!(!tmp.exists(), ".tmp should be cleaned up");
        }
    }
}
