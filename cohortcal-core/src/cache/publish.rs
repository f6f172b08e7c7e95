//! Atomic file publication.
//!
//! Content is written to `<path>.tmp`, synced, then renamed over `<path>`, so
//! a reader sees either the previous file or the new one, never a partial
//! write. The parent directory is synced after the rename so a document's
//! rename is durable before its sidecar is written. Callers must hold the
//! entry's lock: the temp name is fixed per target.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ExportError, ExportResult};

pub const TEMP_SUFFIX: &str = ".tmp";

pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

pub fn write_atomic(path: &Path, content: &[u8]) -> ExportResult<()> {
    let tmp = temp_path(path);
    let publish_err = |source| ExportError::Publish {
        path: path.to_path_buf(),
        source,
    };

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(publish_err(e));
    }
    sync_parent(path).map_err(publish_err)
}

/// Flush the directory entry of `path` to disk.
#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => File::open(dir)?.sync_all(),
        None => File::open(".")?.sync_all(),
    }
}

// Directories cannot be opened as files on Windows; rename durability is
// left to the filesystem there.
#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_replaces_content_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.ics");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_parent_directory_can_be_synced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("all.ics");
        fs::create_dir(dir.path().join("nested")).unwrap();

        write_atomic(&path, b"content").unwrap();
        sync_parent(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"content");
    }

    #[test]
    fn test_failed_rename_cleans_up_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.ics");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupant"), b"x").unwrap();

        let err = write_atomic(&path, b"content").unwrap_err();
        assert!(matches!(err, ExportError::Publish { .. }));
        assert!(!temp_path(&path).exists());
    }
}
