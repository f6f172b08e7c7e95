//! Cross-process advisory locks on cache entries.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::warn;

use crate::error::{ExportError, ExportResult};

/// A lock guard that releases the lock when dropped.
///
/// The lock file itself is never removed: deleting it while another process
/// waits on the old inode would let two holders coexist.
#[derive(Debug)]
pub struct EntryLock {
    file: File,
    path: PathBuf,
}

fn open(path: &Path) -> ExportResult<File> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|source| ExportError::Lock {
            path: path.to_path_buf(),
            source,
        })
}

impl EntryLock {
    /// Acquire the lock, blocking until the current holder releases it.
    pub fn acquire(path: &Path) -> ExportResult<Self> {
        let file = open(path)?;
        file.lock_exclusive().map_err(|source| ExportError::Lock {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(EntryLock {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Acquire the lock only if nobody holds it.
    pub fn try_acquire(path: &Path) -> ExportResult<Option<Self>> {
        let file = open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(EntryLock {
                file,
                path: path.to_path_buf(),
            })),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release cache lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.ics.lock");

        let held = EntryLock::acquire(&path).unwrap();
        assert!(EntryLock::try_acquire(&path).unwrap().is_none());

        drop(held);
        assert!(EntryLock::try_acquire(&path).unwrap().is_some());
        assert!(path.exists());
    }
}
