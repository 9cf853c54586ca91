//! Manifests and their on-disk store.
//!
//! A manifest groups one config blob and an ordered list of layer blobs
//! under a `(name, tag)` reference. It owns no bytes, only digest pointers,
//! and lives at `manifests/<name>/<tag>` as a JSON document.

use crate::config::{MediaType, StoreConfig};
use crate::error::{MapleError, Result};
use crate::platform::StorePaths;
use crate::storage::atomic::{atomic_read_json, atomic_write_json};
use crate::storage::digest::Digest;
use crate::storage::reference::Reference;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Pointer to a blob with its declared media type and size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub media_type: String,
    pub digest: Digest,
    pub size: u64,
}

impl Layer {
    pub fn new(media_type: MediaType, digest: Digest, size: u64) -> Self {
        Self {
            media_type: media_type.as_str().to_string(),
            digest,
            size,
        }
    }

    /// Known media type, or `None` for types this version does not know.
    pub fn known_media_type(&self) -> Option<MediaType> {
        MediaType::parse(&self.media_type)
    }
}

/// Descriptor of one tagged bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    pub media_type: String,
    pub config: Layer,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl Manifest {
    pub fn new(config: Layer, layers: Vec<Layer>) -> Self {
        Self {
            schema_version: StoreConfig::SCHEMA_VERSION,
            media_type: MediaType::Manifest.as_str().to_string(),
            config,
            layers,
        }
    }

    /// Config digest followed by layer digests, deduplicated.
    pub fn digests(&self) -> BTreeSet<Digest> {
        std::iter::once(&self.config)
            .chain(self.layers.iter())
            .map(|layer| layer.digest.clone())
            .collect()
    }

    /// Sum of the declared sizes of config and layers.
    pub fn total_size(&self) -> u64 {
        self.config.size + self.layers.iter().map(|l| l.size).sum::<u64>()
    }
}

/// JSON manifests keyed by `(name, tag)`.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    paths: StorePaths,
}

impl ManifestStore {
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    pub fn path_of(&self, reference: &Reference) -> Result<PathBuf> {
        self.paths.manifest_path(&reference.name, &reference.tag)
    }

    /// Persist a manifest, replacing any previous one atomically.
    pub fn save(&self, reference: &Reference, manifest: &Manifest) -> Result<()> {
        let path = self.path_of(reference)?;
        atomic_write_json(&path, manifest)?;
        debug!("Saved manifest {}", reference);
        Ok(())
    }

    /// Load a manifest. Absent is `NotFound`; unparsable is `Corrupt`.
    pub fn load(&self, reference: &Reference) -> Result<Manifest> {
        let path = self.path_of(reference)?;
        atomic_read_json(&path)?.ok_or_else(|| MapleError::manifest_not_found(reference.to_string()))
    }

    pub fn exists(&self, reference: &Reference) -> Result<bool> {
        Ok(self.path_of(reference)?.is_file())
    }

    /// Remove the manifest file. Blobs are never touched here.
    pub fn delete(&self, reference: &Reference) -> Result<()> {
        let path = self.path_of(reference)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MapleError::manifest_not_found(reference.to_string()));
            }
            Err(e) => return Err(MapleError::io_with_path(e, &path)),
        }
        debug!("Deleted manifest {}", reference);

        // Drop the name directory once its last tag is gone. Fails harmlessly
        // when other tags remain or a writer just created a new one.
        if let Some(name_dir) = path.parent() {
            let _ = fs::remove_dir(name_dir);
        }
        Ok(())
    }

    /// Modification time of the manifest file.
    pub fn modified(&self, reference: &Reference) -> Result<SystemTime> {
        let path = self.path_of(reference)?;
        fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => MapleError::manifest_not_found(reference.to_string()),
                _ => MapleError::io_with_path(e, &path),
            })
    }

    /// Every stored reference, derived from the `<name>/<tag>` tree.
    ///
    /// Entries that cannot be references (hidden files, non-UTF-8 names,
    /// files at the wrong depth) are skipped, and so are unreadable
    /// directories, with a warning.
    pub fn list_references(&self) -> Result<BTreeSet<Reference>> {
        let scan = self.scan_references()?;
        for path in &scan.unlisted {
            warn!("Skipping unreadable manifest directory {}", path.display());
        }
        Ok(scan.references)
    }

    /// Walk the manifest tree, keeping the directories that could not be
    /// read apart from the references that were found.
    pub fn scan_references(&self) -> Result<ReferenceScan> {
        let root = self.paths.manifests_dir();
        let mut scan = ReferenceScan::default();
        if !root.exists() {
            return Ok(scan);
        }

        let walker = WalkDir::new(root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Manifest walk error: {}", e);
                    let path = e.path().unwrap_or(root).to_path_buf();
                    scan.unlisted.push(path);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let tag = entry.file_name().to_str();
            let name = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str());

            match (name, tag) {
                (Some(name), Some(tag)) => {
                    scan.references.insert(Reference::new(name, tag));
                }
                _ => debug!("Skipping non UTF-8 manifest path {}", entry.path().display()),
            }
        }

        Ok(scan)
    }
}

/// References found by a manifest tree walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceScan {
    pub references: BTreeSet<Reference>,
    /// Directories the walk could not read; they may hold manifests.
    pub unlisted: Vec<PathBuf>,
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}
