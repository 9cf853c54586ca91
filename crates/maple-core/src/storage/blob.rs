//! Content-addressed blob storage.
//!
//! Every blob lives at `blobs/sha256-<hex>` and is written exactly once:
//! bytes are streamed into a hidden temp file in the same directory while
//! being hashed, then renamed to their digest name. A reader can therefore
//! never observe a partially written blob under its final name, and two
//! writers of identical content converge on the same file.

use crate::config::StoreConfig;
use crate::error::{MapleError, Result};
use crate::platform::StorePaths;
use crate::storage::atomic::temp_file_in;
use crate::storage::digest::{hash_copy, Digest};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Write-once, digest-keyed object storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    paths: StorePaths,
}

impl BlobStore {
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    pub fn dir(&self) -> &Path {
        self.paths.blobs_dir()
    }

    pub fn path_of(&self, digest: &Digest) -> PathBuf {
        self.paths.blob_path(digest)
    }

    /// Stream `reader` into the store.
    ///
    /// Returns the digest of the bytes and their count. Storing content that
    /// is already present keeps the existing object and succeeds, unless
    /// its size shows it was damaged, in which case it is replaced.
    pub fn put<R: Read>(&self, mut reader: R) -> Result<(Digest, u64)> {
        let mut temp = temp_file_in(self.dir())?;

        let (digest, size) = hash_copy(&mut reader, temp.as_file_mut())
            .and_then(|written| temp.as_file().sync_all().map(|_| written))
            .map_err(|e| MapleError::Io {
                message: format!("Failed to write blob data to {}", temp.path().display()),
                path: Some(temp.path().to_path_buf()),
                source: Some(e),
            })?;

        let final_path = self.path_of(&digest);
        match fs::metadata(&final_path) {
            Ok(existing) if existing.is_file() && existing.len() == size => {
                // Identical bytes are already stored; dropping `temp` removes it.
                debug!("Blob {} already present ({} bytes)", digest, size);
                return Ok((digest, size));
            }
            Ok(_) => warn!("Replacing damaged blob {}", digest),
            Err(_) => {}
        }

        temp.persist(&final_path).map_err(|e| MapleError::Io {
            message: format!("Failed to move blob into place at {}", final_path.display()),
            path: Some(final_path.clone()),
            source: Some(e.error),
        })?;

        debug!("Stored blob {} ({} bytes)", digest, size);
        Ok((digest, size))
    }

    pub fn put_bytes(&self, bytes: &[u8]) -> Result<(Digest, u64)> {
        self.put(bytes)
    }

    pub fn exists(&self, digest: &Digest) -> bool {
        self.path_of(digest).is_file()
    }

    pub fn size(&self, digest: &Digest) -> Result<u64> {
        let path = self.path_of(digest);
        fs::metadata(&path)
            .map(|m| m.len())
            .map_err(|e| not_found_or_io(e, digest, &path))
    }

    pub fn open(&self, digest: &Digest) -> Result<File> {
        let path = self.path_of(digest);
        File::open(&path).map_err(|e| not_found_or_io(e, digest, &path))
    }

    /// Read a whole blob into memory. Meant for small blobs such as configs.
    pub fn read_to_vec(&self, digest: &Digest) -> Result<Vec<u8>> {
        let path = self.path_of(digest);
        fs::read(&path).map_err(|e| not_found_or_io(e, digest, &path))
    }

    /// Remove a blob unconditionally.
    ///
    /// Reachability is the garbage collector's concern, not this method's.
    pub fn delete(&self, digest: &Digest) -> Result<()> {
        let path = self.path_of(digest);
        fs::remove_file(&path).map_err(|e| not_found_or_io(e, digest, &path))?;
        debug!("Deleted blob {}", digest);
        Ok(())
    }

    /// All stored digests. Temp files and stray entries are skipped.
    pub fn list(&self) -> Result<BTreeSet<Digest>> {
        let mut digests = BTreeSet::new();
        for entry in self.read_dir()? {
            let entry = entry.map_err(|e| MapleError::io_with_path(e, self.dir()))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(digest) = entry.file_name().to_str().and_then(Digest::from_filename) {
                digests.insert(digest);
            }
        }
        Ok(digests)
    }

    /// Re-hash a stored blob and check it against its name.
    pub fn verify(&self, digest: &Digest) -> Result<()> {
        let path = self.path_of(digest);
        let mut file = File::open(&path).map_err(|e| not_found_or_io(e, digest, &path))?;
        let (actual, _) =
            hash_copy(&mut file, &mut io::sink()).map_err(|e| MapleError::io_with_path(e, &path))?;

        if &actual == digest {
            Ok(())
        } else {
            Err(MapleError::corrupt(
                path,
                format!("content hashes to {}, expected {}", actual, digest),
            ))
        }
    }

    /// Temp files left behind by interrupted writers.
    pub fn stale_temp_files(&self) -> Result<Vec<PathBuf>> {
        let mut stale = Vec::new();
        for entry in self.read_dir()? {
            let entry = entry.map_err(|e| MapleError::io_with_path(e, self.dir()))?;
            let name = entry.file_name();
            if name
                .to_str()
                .is_some_and(|n| n.starts_with(StoreConfig::TEMP_PREFIX))
            {
                stale.push(entry.path());
            }
        }
        stale.sort();
        Ok(stale)
    }

    fn read_dir(&self) -> Result<Box<dyn Iterator<Item = io::Result<fs::DirEntry>>>> {
        match fs::read_dir(self.dir()) {
            Ok(entries) => Ok(Box::new(entries)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Box::new(std::iter::empty())),
            Err(e) => Err(MapleError::io_with_path(e, self.dir())),
        }
    }
}

fn not_found_or_io(err: io::Error, digest: &Digest, path: &Path) -> MapleError {
    if err.kind() == ErrorKind::NotFound {
        MapleError::blob_not_found(digest.to_string())
    } else {
        MapleError::io_with_path(err, path)
    }
}
