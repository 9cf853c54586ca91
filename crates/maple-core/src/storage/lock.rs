//! Advisory lock over the store root.
//!
//! The daemon and short-lived CLI processes share one store without sharing
//! memory, so coordination goes through an `fs2` lock on `<root>/.lock`:
//! - exclusive for garbage collection (reference removal, prune)
//! - shared for writes that must not race with it (blob puts, manifest saves, imports)
//!
//! Reads take no lock. The lock is released when the guard is dropped, or
//! by the OS if the holder dies.

use crate::error::{MapleError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// RAII guard for the store lock.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl StoreLock {
    /// Block until the exclusive lock is held.
    pub fn exclusive(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_exclusive(&file).map_err(|e| MapleError::io_with_path(e, path))?;
        Ok(Self::held(file, path, LockMode::Exclusive))
    }

    /// Block until a shared lock is held.
    pub fn shared(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_shared(&file).map_err(|e| MapleError::io_with_path(e, path))?;
        Ok(Self::held(file, path, LockMode::Shared))
    }

    /// Take the exclusive lock if nobody else holds the lock in any mode.
    pub fn try_exclusive(path: &Path) -> Result<Option<Self>> {
        let file = open_lock_file(path)?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self::held(file, path, LockMode::Exclusive))),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(MapleError::io_with_path(e, path)),
        }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    fn held(file: File, path: &Path, mode: LockMode) -> Self {
        debug!("Acquired {:?} store lock {}", mode, path.display());
        Self {
            file,
            path: path.to_path_buf(),
            mode,
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // Closing the file releases the lock anyway; unlock explicitly so the
        // release is not delayed by a lingering duplicate descriptor.
        let _ = FileExt::unlock(&self.file);
        debug!("Released {:?} store lock {}", self.mode, self.path.display());
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| MapleError::io_with_path(e, path))
}
