//! Reference removal and blob reclamation.
//!
//! Removing a tagged bundle deletes its manifest and then every blob it
//! named that no remaining manifest still names. Liveness is recomputed
//! from the manifests on disk at deletion time; there is no stored
//! reference count to drift out of sync.
//!
//! The caller must hold the exclusive store lock for the whole call, so no
//! manifest naming a candidate blob can appear between the liveness scan
//! and the sweep, and no blob write is in flight.

use crate::error::{ErrorKind, MapleError, Result};
use crate::storage::blob::BlobStore;
use crate::storage::digest::Digest;
use crate::storage::manifest::ManifestStore;
use crate::storage::reference::Reference;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What to do when a remaining manifest cannot be read during the scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SweepPolicy {
    /// An unreadable manifest might name any blob, so nothing is deleted.
    #[default]
    Conservative,
    /// Skip unreadable manifests with a warning and sweep anyway.
    Force,
}

/// Outcome of removing one reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub reference: Option<Reference>,
    /// Blobs deleted by this call.
    pub removed: Vec<Digest>,
    /// Candidates kept because another manifest names them, or because
    /// their liveness could not be proven.
    pub retained: Vec<Digest>,
    /// Candidates whose deletion failed.
    pub failed: Vec<(Digest, String)>,
    /// Remaining references whose manifests could not be read.
    pub unreadable: Vec<Reference>,
    /// Manifest directories that could not be listed.
    pub unlisted: Vec<PathBuf>,
    /// Set when unreadable manifests blocked the sweep.
    pub liveness_unproven: bool,
    /// Set when the target manifest itself was unreadable and was removed
    /// without reclaiming any blob.
    pub target_unreadable: bool,
}

impl RemovalReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// Outcome of an orphan sweep over the whole blob area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: Vec<Digest>,
    pub failed: Vec<(Digest, String)>,
    pub temp_files_removed: Vec<PathBuf>,
    pub unreadable: Vec<Reference>,
    pub unlisted: Vec<PathBuf>,
    pub liveness_unproven: bool,
}

/// Reachability-based collector over one blob and manifest store.
pub struct GarbageCollector<'a> {
    blobs: &'a BlobStore,
    manifests: &'a ManifestStore,
    policy: SweepPolicy,
}

/// Digests named by all readable manifests, plus whatever could not be read.
struct Liveness {
    reachable: BTreeSet<Digest>,
    unreadable: Vec<Reference>,
    unlisted: Vec<PathBuf>,
}

impl Liveness {
    fn is_complete(&self) -> bool {
        self.unreadable.is_empty() && self.unlisted.is_empty()
    }
}

impl<'a> GarbageCollector<'a> {
    pub fn new(blobs: &'a BlobStore, manifests: &'a ManifestStore, policy: SweepPolicy) -> Self {
        Self {
            blobs,
            manifests,
            policy,
        }
    }

    /// Remove `reference` and every blob only it was keeping alive.
    ///
    /// Fails `NotFound` if the reference has no manifest. A failure to
    /// delete the manifest aborts before any blob is touched. Failures to
    /// delete individual blobs afterwards are recorded in the report.
    ///
    /// A corrupt target fails `Corrupt` under the conservative policy. Under
    /// the force policy its file is deleted and its blobs are left for a
    /// later prune, since the blobs it named cannot be known.
    pub fn remove(&self, reference: &Reference) -> Result<RemovalReport> {
        let target = match self.manifests.load(reference) {
            Ok(manifest) => manifest,
            Err(e) if e.kind() == ErrorKind::Corrupt && self.policy == SweepPolicy::Force => {
                warn!("Removing unreadable manifest {}: {}", reference, e);
                self.manifests.delete(reference)?;
                return Ok(RemovalReport {
                    reference: Some(reference.clone()),
                    target_unreadable: true,
                    ..Default::default()
                });
            }
            Err(e) => return Err(e),
        };
        let candidates = target.digests();

        self.manifests.delete(reference)?;

        let liveness = self.scan()?;
        let mut report = RemovalReport {
            reference: Some(reference.clone()),
            unreadable: liveness.unreadable.clone(),
            unlisted: liveness.unlisted.clone(),
            ..Default::default()
        };

        if self.blocked(&liveness) {
            warn!(
                "Keeping {} blob(s) of {}: liveness unproven ({} manifest(s), {} dir(s) unreadable)",
                candidates.len(),
                reference,
                liveness.unreadable.len(),
                liveness.unlisted.len()
            );
            report.liveness_unproven = true;
            report.retained = candidates.into_iter().collect();
            return Ok(report);
        }

        for digest in candidates {
            if liveness.reachable.contains(&digest) {
                debug!("Retaining shared blob {}", digest);
                report.retained.push(digest);
                continue;
            }
            match self.blobs.delete(&digest) {
                Ok(()) => report.removed.push(digest),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("Blob {} was already gone", digest);
                }
                Err(e) => {
                    warn!("Failed to delete blob {}: {}", digest, e);
                    report.failed.push((digest, e.to_string()));
                }
            }
        }

        info!(
            "Removed {}: {} blob(s) deleted, {} retained, {} failed",
            reference,
            report.removed.len(),
            report.retained.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Delete every blob no manifest names, plus stale temp files.
    pub fn prune(&self) -> Result<PruneReport> {
        let liveness = self.scan()?;
        let mut report = PruneReport {
            unreadable: liveness.unreadable.clone(),
            unlisted: liveness.unlisted.clone(),
            ..Default::default()
        };

        // Blob writers hold the shared lock until their rename, so with the
        // exclusive lock held any temp file here belongs to a dead writer.
        for path in self.blobs.stale_temp_files()? {
            match fs::remove_file(&path) {
                Ok(()) => report.temp_files_removed.push(path),
                Err(e) => warn!("Failed to remove temp file {}: {}", path.display(), e),
            }
        }

        if self.blocked(&liveness) {
            warn!(
                "Skipping orphan sweep: {} manifest(s) and {} directory(ies) unreadable",
                liveness.unreadable.len(),
                liveness.unlisted.len()
            );
            report.liveness_unproven = true;
            return Ok(report);
        }

        for digest in self.blobs.list()? {
            if liveness.reachable.contains(&digest) {
                continue;
            }
            match self.blobs.delete(&digest) {
                Ok(()) => report.removed.push(digest),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to delete orphan blob {}: {}", digest, e);
                    report.failed.push((digest, e.to_string()));
                }
            }
        }

        info!(
            "Pruned {} orphan blob(s) and {} temp file(s)",
            report.removed.len(),
            report.temp_files_removed.len()
        );
        Ok(report)
    }

    fn blocked(&self, liveness: &Liveness) -> bool {
        !liveness.is_complete() && self.policy == SweepPolicy::Conservative
    }

    /// Union of the digests named by every manifest currently on disk.
    fn scan(&self) -> Result<Liveness> {
        let scan = self.manifests.scan_references()?;
        let mut liveness = Liveness {
            reachable: BTreeSet::new(),
            unreadable: Vec::new(),
            unlisted: scan.unlisted,
        };
        for path in &liveness.unlisted {
            warn!("Could not list manifest directory {} during sweep", path.display());
        }

        for reference in scan.references {
            match self.manifests.load(&reference) {
                Ok(manifest) => liveness.reachable.extend(manifest.digests()),
                // Vanished since listing: names nothing.
                Err(MapleError::NotFound { .. }) => {}
                Err(e) => {
                    warn!("Could not read manifest {} during sweep: {}", reference, e);
                    liveness.unreadable.push(reference);
                }
            }
        }

        Ok(liveness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaType;
    use crate::platform::StorePaths;
    use crate::storage::manifest::{Layer, Manifest};
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        paths: StorePaths,
        blobs: BlobStore,
        manifests: ManifestStore,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let paths = StorePaths::new(tmp.path());
        paths.ensure_dirs().unwrap();
        Fixture {
            blobs: BlobStore::new(paths.clone()),
            manifests: ManifestStore::new(paths.clone()),
            paths,
            _tmp: tmp,
        }
    }

    fn bundle(fx: &Fixture, reference: &str, config: &[u8], layers: &[&[u8]]) -> Manifest {
        let (cfg, cfg_size) = fx.blobs.put_bytes(config).unwrap();
        let layers = layers
            .iter()
            .map(|bytes| {
                let (digest, size) = fx.blobs.put_bytes(bytes).unwrap();
                Layer::new(MediaType::Weights, digest, size)
            })
            .collect();
        let manifest = Manifest::new(Layer::new(MediaType::Config, cfg, cfg_size), layers);
        fx.manifests.save(&Reference::parse(reference), &manifest).unwrap();
        manifest
    }

    #[test]
    fn test_remove_unshared_bundle_deletes_all_its_blobs() {
        let fx = fixture();
        bundle(&fx, "a", b"cfg-a", &[b"w1", b"w2"]);
        bundle(&fx, "b", b"cfg-b", &[b"w3"]);
        assert_eq!(fx.blobs.list().unwrap().len(), 5);

        let gc = GarbageCollector::new(&fx.blobs, &fx.manifests, SweepPolicy::Conservative);
        let report = gc.remove(&Reference::parse("a")).unwrap();

        assert_eq!(report.removed_count(), 3);
        assert!(report.retained.is_empty());
        assert_eq!(fx.blobs.list().unwrap().len(), 2);
    }

    #[test]
    fn test_remove_keeps_shared_blobs() {
        let fx = fixture();
        bundle(&fx, "m:latest", b"AAA", &[b"shared-weights", b"only-latest"]);
        bundle(&fx, "m:v2", b"AAA", &[b"shared-weights"]);

        let gc = GarbageCollector::new(&fx.blobs, &fx.manifests, SweepPolicy::Conservative);
        let report = gc.remove(&Reference::parse("m:latest")).unwrap();

        assert_eq!(report.removed, vec![Digest::of_bytes(b"only-latest")]);
        assert_eq!(report.retained.len(), 2);
        assert!(fx.blobs.exists(&Digest::of_bytes(b"AAA")));
        assert!(fx.blobs.exists(&Digest::of_bytes(b"shared-weights")));
    }

    #[test]
    fn test_remove_missing_reference_is_not_found() {
        let fx = fixture();
        let gc = GarbageCollector::new(&fx.blobs, &fx.manifests, SweepPolicy::Conservative);
        let err = gc.remove(&Reference::parse("ghost")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_blob_already_gone_is_not_a_failure() {
        let fx = fixture();
        bundle(&fx, "a", b"cfg", &[b"weights"]);
        fx.blobs.delete(&Digest::of_bytes(b"weights")).unwrap();

        let gc = GarbageCollector::new(&fx.blobs, &fx.manifests, SweepPolicy::Conservative);
        let report = gc.remove(&Reference::parse("a")).unwrap();
        assert_eq!(report.removed, vec![Digest::of_bytes(b"cfg")]);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_conservative_policy_blocks_on_unreadable_manifest() {
        let fx = fixture();
        bundle(&fx, "a", b"cfg", &[b"weights"]);
        let corrupt = fx.paths.manifest_path("broken", "latest").unwrap();
        fs::create_dir_all(corrupt.parent().unwrap()).unwrap();
        fs::write(&corrupt, b"not json").unwrap();

        let gc = GarbageCollector::new(&fx.blobs, &fx.manifests, SweepPolicy::Conservative);
        let report = gc.remove(&Reference::parse("a")).unwrap();

        assert!(report.liveness_unproven);
        assert_eq!(report.removed_count(), 0);
        assert_eq!(report.retained.len(), 2);
        assert_eq!(report.unreadable, vec![Reference::parse("broken")]);
        // The target manifest is gone regardless.
        assert!(!fx.manifests.exists(&Reference::parse("a")).unwrap());
    }

    #[test]
    fn test_force_policy_skips_unreadable_manifest() {
        let fx = fixture();
        bundle(&fx, "a", b"cfg", &[b"weights"]);
        let corrupt = fx.paths.manifest_path("broken", "latest").unwrap();
        fs::create_dir_all(corrupt.parent().unwrap()).unwrap();
        fs::write(&corrupt, b"not json").unwrap();

        let gc = GarbageCollector::new(&fx.blobs, &fx.manifests, SweepPolicy::Force);
        let report = gc.remove(&Reference::parse("a")).unwrap();

        assert!(!report.liveness_unproven);
        assert_eq!(report.removed_count(), 2);
        assert_eq!(report.unreadable.len(), 1);
    }

    #[test]
    fn test_prune_removes_orphans_and_temp_files() {
        let fx = fixture();
        bundle(&fx, "kept", b"cfg", &[b"weights"]);
        let (orphan, _) = fx.blobs.put_bytes(b"never referenced").unwrap();
        fs::write(fx.blobs.dir().join(".tmp-dead-writer"), b"partial").unwrap();

        let gc = GarbageCollector::new(&fx.blobs, &fx.manifests, SweepPolicy::Conservative);
        let report = gc.prune().unwrap();

        assert_eq!(report.removed, vec![orphan]);
        assert_eq!(report.temp_files_removed.len(), 1);
        assert_eq!(fx.blobs.list().unwrap().len(), 2);
    }

    #[test]
    fn test_corrupt_target_needs_force() {
        let fx = fixture();
        bundle(&fx, "kept", b"cfg", &[b"weights"]);
        let corrupt = fx.paths.manifest_path("broken", "latest").unwrap();
        fs::create_dir_all(corrupt.parent().unwrap()).unwrap();
        fs::write(&corrupt, b"not json").unwrap();
        let broken = Reference::parse("broken");

        let gc = GarbageCollector::new(&fx.blobs, &fx.manifests, SweepPolicy::Conservative);
        let err = gc.remove(&broken).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert!(corrupt.exists());

        let gc = GarbageCollector::new(&fx.blobs, &fx.manifests, SweepPolicy::Force);
        let report = gc.remove(&broken).unwrap();
        assert!(report.target_unreadable);
        assert_eq!(report.removed_count(), 0);
        assert!(!corrupt.exists());
        assert_eq!(fx.blobs.list().unwrap().len(), 2);

        // Nothing unreadable is left to block later sweeps.
        let gc = GarbageCollector::new(&fx.blobs, &fx.manifests, SweepPolicy::Conservative);
        assert!(!gc.prune().unwrap().liveness_unproven);
    }

    #[test]
    fn test_failed_blob_delete_is_reported_and_manifest_stays_gone() {
        let fx = fixture();
        bundle(&fx, "a", b"cfg", &[b"weights"]);
        let stuck = Digest::of_bytes(b"weights");
        let stuck_path = fx.blobs.path_of(&stuck);
        fs::remove_file(&stuck_path).unwrap();
        fs::create_dir(&stuck_path).unwrap();

        let gc = GarbageCollector::new(&fx.blobs, &fx.manifests, SweepPolicy::Conservative);
        let report = gc.remove(&Reference::parse("a")).unwrap();

        assert_eq!(report.removed, vec![Digest::of_bytes(b"cfg")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, stuck);
        assert!(!fx.manifests.exists(&Reference::parse("a")).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_manifest_delete_failure_touches_no_blob() {
        use std::os::unix::fs::PermissionsExt;

        let fx = fixture();
        let manifest = bundle(&fx, "a", b"cfg", &[b"weights"]);
        let name_dir = fx.paths.manifests_dir().join("a");
        fs::set_permissions(&name_dir, fs::Permissions::from_mode(0o555)).unwrap();
        if fs::write(name_dir.join("writable"), b"").is_ok() {
            // Privileged users ignore directory permissions.
            fs::remove_file(name_dir.join("writable")).unwrap();
            fs::set_permissions(&name_dir, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let gc = GarbageCollector::new(&fx.blobs, &fx.manifests, SweepPolicy::Conservative);
        let result = gc.remove(&Reference::parse("a"));
        fs::set_permissions(&name_dir, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Io);
        assert!(fx.manifests.exists(&Reference::parse("a")).unwrap());
        for digest in manifest.digests() {
            assert!(fx.blobs.exists(&digest));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_conservative_policy_blocks_on_unlistable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let fx = fixture();
        bundle(&fx, "a", b"cfg-a", &[b"shared"]);
        bundle(&fx, "b", b"cfg-b", &[b"shared"]);
        let hidden = fx.paths.manifests_dir().join("b");
        fs::set_permissions(&hidden, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&hidden).is_ok() {
            // Privileged users ignore directory permissions.
            fs::set_permissions(&hidden, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let gc = GarbageCollector::new(&fx.blobs, &fx.manifests, SweepPolicy::Conservative);
        let report = gc.remove(&Reference::parse("a"));
        fs::set_permissions(&hidden, fs::Permissions::from_mode(0o755)).unwrap();
        let report = report.unwrap();

        assert!(report.liveness_unproven);
        assert_eq!(report.unlisted, vec![hidden]);
        assert_eq!(report.removed_count(), 0);
        assert!(fx.blobs.exists(&Digest::of_bytes(b"shared")));
    }
}
