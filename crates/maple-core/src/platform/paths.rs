//! Store path resolution.
//!
//! Derives the store root and its subtrees from the environment:
//! - `$MAPLE_HOME` when set and non-empty
//! - otherwise `~/.maple`
//!
//! ```text
//! <root>/blobs/sha256-<hex>
//! <root>/manifests/<name>/<tag>
//! <root>/.lock
//! ```

use crate::config::StoreConfig;
use crate::error::{MapleError, Result};
use crate::storage::Digest;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolved on-disk locations of one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    root: PathBuf,
    blobs: PathBuf,
    manifests: PathBuf,
    lock: PathBuf,
}

impl StorePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            blobs: root.join(StoreConfig::BLOBS_DIR_NAME),
            manifests: root.join(StoreConfig::MANIFESTS_DIR_NAME),
            lock: root.join(StoreConfig::LOCK_FILE_NAME),
            root,
        }
    }

    /// Resolve the store root from `$MAPLE_HOME` or the user's home directory.
    pub fn from_env() -> Result<Self> {
        let override_root = std::env::var_os(StoreConfig::HOME_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::resolve(override_root, dirs::home_dir())
    }

    /// Pure resolution step behind [`StorePaths::from_env`].
    pub fn resolve(override_root: Option<PathBuf>, home: Option<PathBuf>) -> Result<Self> {
        if let Some(root) = override_root {
            return Ok(Self::new(root));
        }
        let home = home.ok_or_else(|| MapleError::Config {
            message: "Could not determine home directory".to_string(),
        })?;
        Ok(Self::new(home.join(StoreConfig::HOME_DIR_NAME)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blobs_dir(&self) -> &Path {
        &self.blobs
    }

    pub fn manifests_dir(&self) -> &Path {
        &self.manifests
    }

    pub fn lock_file(&self) -> &Path {
        &self.lock
    }

    /// Create the root, blob and manifest directories.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.root, &self.blobs, &self.manifests] {
            fs::create_dir_all(dir).map_err(|e| MapleError::io_with_path(e, dir))?;
        }
        Ok(())
    }

    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.blobs.join(digest.filename())
    }

    /// Path of the manifest for `(name, tag)`.
    ///
    /// Both components become single path segments, so anything that could
    /// escape or alias the manifest tree is rejected.
    pub fn manifest_path(&self, name: &str, tag: &str) -> Result<PathBuf> {
        validate_component(name, tag, name, "name")?;
        validate_component(name, tag, tag, "tag")?;
        Ok(self.manifests.join(name).join(tag))
    }
}

fn validate_component(name: &str, tag: &str, value: &str, what: &str) -> Result<()> {
    let reason = if value.is_empty() {
        Some(format!("{} is empty", what))
    } else if value == "." || value == ".." {
        Some(format!("{} may not be '.' or '..'", what))
    } else if value.starts_with('.') {
        Some(format!("{} may not start with '.'", what))
    } else if value.contains(['/', '\\', '\0']) {
        Some(format!("{} may not contain path separators", what))
    } else {
        None
    };

    match reason {
        Some(reason) => Err(MapleError::InvalidReference {
            reference: format!("{}:{}", name, tag),
            reason,
        }),
        None => Ok(()),
    }
}
