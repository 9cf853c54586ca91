//! The store facade.
//!
//! `Store` is the single surface the CLI and the daemon bind to. It owns the
//! resolved paths and applies the locking discipline around the raw blob
//! and manifest stores:
//! - removal and prune run under the exclusive lock
//! - blob writes, manifest saves and imports run under a shared lock
//! - manifest saves check that every digest they name exists
//! - reads take no lock

use crate::config::MediaType;
use crate::error::{MapleError, Result};
use crate::platform::StorePaths;
use crate::storage::{
    BlobStore, Digest, GarbageCollector, Layer, Manifest, ManifestStore, ModelConfig,
    PruneReport, Reference, RemovalReport, StoreLock, SweepPolicy,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// One row of a bundle listing.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleSummary {
    pub reference: Reference,
    /// Declared size of config plus layers; `None` if the manifest is unreadable.
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    /// Load error for unreadable manifests.
    pub error: Option<String>,
}

/// Result of a full consistency check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub blobs_checked: usize,
    pub manifests_checked: usize,
    /// Blobs whose bytes no longer hash to their name.
    pub corrupt_blobs: Vec<(Digest, String)>,
    pub corrupt_manifests: Vec<(Reference, String)>,
    /// Manifest directories that could not be listed.
    pub unlisted: Vec<PathBuf>,
    /// Manifests naming a blob that does not exist.
    pub dangling: Vec<(Reference, Digest)>,
    /// Blobs no manifest names.
    pub orphans: Vec<Digest>,
    pub stale_temp_files: Vec<PathBuf>,
}

impl IntegrityReport {
    /// True when nothing would be lost or misread. Orphans and stale temp
    /// files only waste space.
    pub fn is_healthy(&self) -> bool {
        self.corrupt_blobs.is_empty()
            && self.corrupt_manifests.is_empty()
            && self.unlisted.is_empty()
            && self.dangling.is_empty()
    }
}

/// Content-addressed model store rooted at one directory.
#[derive(Debug, Clone)]
pub struct Store {
    paths: StorePaths,
    blobs: BlobStore,
    manifests: ManifestStore,
}

impl Store {
    /// Open the store at `paths`, creating its directories if needed.
    pub fn open(paths: StorePaths) -> Result<Self> {
        paths.ensure_dirs()?;
        debug!("Opened store at {}", paths.root().display());
        Ok(Self {
            blobs: BlobStore::new(paths.clone()),
            manifests: ManifestStore::new(paths.clone()),
            paths,
        })
    }

    /// Open the store at `$MAPLE_HOME` or `~/.maple`.
    pub fn from_env() -> Result<Self> {
        Self::open(StorePaths::from_env()?)
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// Map `name[:tag]` to a reference.
    pub fn resolve(reference: &str) -> Reference {
        Reference::parse(reference)
    }

    // Blobs

    /// Stream a blob into the store.
    ///
    /// Holds the shared lock for the whole write, so a prune cannot reap
    /// the temp file while bytes are still arriving.
    pub fn put_blob<R: Read>(&self, reader: R) -> Result<(Digest, u64)> {
        let _lock = StoreLock::shared(self.paths.lock_file())?;
        self.blobs.put(reader)
    }

    pub fn put_bytes(&self, bytes: &[u8]) -> Result<(Digest, u64)> {
        self.put_blob(bytes)
    }

    pub fn get_blob(&self, digest: &Digest) -> Result<File> {
        self.blobs.open(digest)
    }

    pub fn blob_exists(&self, digest: &Digest) -> bool {
        self.blobs.exists(digest)
    }

    pub fn blob_size(&self, digest: &Digest) -> Result<u64> {
        self.blobs.size(digest)
    }

    pub fn list_blobs(&self) -> Result<BTreeSet<Digest>> {
        self.blobs.list()
    }

    // Manifests

    /// Save a manifest after checking that every blob it names exists.
    pub fn save_manifest(&self, reference: &Reference, manifest: &Manifest) -> Result<()> {
        let _lock = StoreLock::shared(self.paths.lock_file())?;
        self.save_manifest_locked(reference, manifest)
    }

    pub fn load_manifest(&self, reference: &Reference) -> Result<Manifest> {
        self.manifests.load(reference)
    }

    pub fn manifest_exists(&self, reference: &Reference) -> Result<bool> {
        self.manifests.exists(reference)
    }

    pub fn list_references(&self) -> Result<Vec<Reference>> {
        Ok(self.manifests.list_references()?.into_iter().collect())
    }

    /// Every reference with its size and modification time.
    ///
    /// Unreadable manifests are listed with their error rather than failing
    /// the whole listing.
    pub fn list_bundles(&self) -> Result<Vec<BundleSummary>> {
        let mut bundles = Vec::new();
        for reference in self.manifests.list_references()? {
            let modified = self
                .manifests
                .modified(&reference)
                .ok()
                .map(DateTime::<Utc>::from);
            let (size, error) = match self.manifests.load(&reference) {
                Ok(manifest) => (Some(manifest.total_size()), None),
                Err(e) => (None, Some(e.to_string())),
            };
            bundles.push(BundleSummary {
                reference,
                size,
                modified,
                error,
            });
        }
        Ok(bundles)
    }

    /// Load and decode the config blob of a bundle.
    pub fn load_config(&self, reference: &Reference) -> Result<ModelConfig> {
        let manifest = self.manifests.load(reference)?;
        let digest = &manifest.config.digest;
        let bytes = self.blobs.read_to_vec(digest)?;
        ModelConfig::decode(&bytes, &self.blobs.path_of(digest))
    }

    /// Ingest a config and layer streams as one bundle under `reference`.
    ///
    /// The shared lock is held from the first blob write to the manifest
    /// save, so a concurrent removal cannot reclaim the new blobs in between.
    pub fn import_bundle<I, R>(
        &self,
        reference: &Reference,
        config: &ModelConfig,
        layers: I,
    ) -> Result<Manifest>
    where
        I: IntoIterator<Item = (MediaType, R)>,
        R: Read,
    {
        // Fail on a bad name before writing any blob.
        self.manifests.path_of(reference)?;

        let _lock = StoreLock::shared(self.paths.lock_file())?;

        let (config_digest, config_size) = self.blobs.put_bytes(&config.encode()?)?;
        let mut manifest_layers = Vec::new();
        for (media_type, reader) in layers {
            let (digest, size) = self.blobs.put(reader)?;
            manifest_layers.push(Layer::new(media_type, digest, size));
        }

        let manifest = Manifest::new(
            Layer::new(MediaType::Config, config_digest, config_size),
            manifest_layers,
        );
        self.save_manifest_locked(reference, &manifest)?;
        info!(
            "Imported {} ({} layer(s), {} bytes)",
            reference,
            manifest.layers.len(),
            manifest.total_size()
        );
        Ok(manifest)
    }

    fn save_manifest_locked(&self, reference: &Reference, manifest: &Manifest) -> Result<()> {
        for digest in manifest.digests() {
            if !self.blobs.exists(&digest) {
                return Err(MapleError::blob_not_found(digest.to_string()));
            }
        }
        self.manifests.save(reference, manifest)
    }

    // Removal

    /// Remove a reference and reclaim the blobs only it kept alive.
    pub fn delete_reference(
        &self,
        reference: &Reference,
        policy: SweepPolicy,
    ) -> Result<RemovalReport> {
        let _lock = StoreLock::exclusive(self.paths.lock_file())?;
        GarbageCollector::new(&self.blobs, &self.manifests, policy).remove(reference)
    }

    /// Remove blobs no manifest names and temp files left by dead writers.
    pub fn prune(&self, policy: SweepPolicy) -> Result<PruneReport> {
        let _lock = StoreLock::exclusive(self.paths.lock_file())?;
        GarbageCollector::new(&self.blobs, &self.manifests, policy).prune()
    }

    // Integrity

    /// Re-hash every blob and cross-check every manifest against the blob area.
    pub fn verify(&self) -> Result<IntegrityReport> {
        let mut report = IntegrityReport::default();
        let stored = self.blobs.list()?;
        let mut referenced = BTreeSet::new();

        let scan = self.manifests.scan_references()?;
        report.unlisted = scan.unlisted;
        for reference in scan.references {
            report.manifests_checked += 1;
            match self.manifests.load(&reference) {
                Ok(manifest) => {
                    for digest in manifest.digests() {
                        if !stored.contains(&digest) {
                            report.dangling.push((reference.clone(), digest.clone()));
                        }
                        referenced.insert(digest);
                    }
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => report.corrupt_manifests.push((reference, e.to_string())),
            }
        }

        for digest in &stored {
            report.blobs_checked += 1;
            match self.blobs.verify(digest) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!("Blob {} failed verification: {}", digest, e);
                    report.corrupt_blobs.push((digest.clone(), e.to_string()));
                }
            }
            if !referenced.contains(digest) {
                report.orphans.push(digest.clone());
            }
        }

        report.stale_temp_files = self.blobs.stale_temp_files()?;
        Ok(report)
    }
}
