//! Content digests.
//!
//! Blobs are named by the SHA256 of their bytes. The canonical text form,
//! which is also the on-disk filename, is `sha256-<64 lowercase hex>`. The
//! OCI spelling `sha256:<hex>` is accepted and normalized.

use crate::config::StoreConfig;
use crate::error::{MapleError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

const ALGORITHM: &str = "sha256";
const HEX_LEN: usize = 64;

/// Algorithm-tagged hash identifying a blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest {
    hex: String,
}

impl Digest {
    /// Parse `sha256-<hex>` or `sha256:<hex>`.
    pub fn parse(s: &str) -> Result<Self> {
        let hex = s
            .strip_prefix("sha256-")
            .or_else(|| s.strip_prefix("sha256:"))
            .ok_or_else(|| MapleError::InvalidDigest(s.to_string()))?;

        if hex.len() != HEX_LEN || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(MapleError::InvalidDigest(s.to_string()));
        }

        Ok(Self {
            hex: hex.to_ascii_lowercase(),
        })
    }

    /// Digest of an in-memory byte slice.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self {
            hex: hex::encode(Sha256::digest(bytes)),
        }
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Filesystem-safe name of the blob holding this digest.
    pub fn filename(&self) -> String {
        format!("{}-{}", ALGORITHM, self.hex)
    }

    /// Parse a directory entry name, returning `None` for anything that is
    /// not a canonical blob filename (temp files, strays).
    pub fn from_filename(name: &str) -> Option<Self> {
        if !name.starts_with("sha256-") {
            return None;
        }
        let digest = Self::parse(name).ok()?;
        (digest.filename() == name).then_some(digest)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", ALGORITHM, self.hex)
    }
}

impl FromStr for Digest {
    type Err = MapleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Copy `reader` into `writer`, hashing the bytes on the way through.
///
/// Returns the digest and the number of bytes copied.
pub(crate) fn hash_copy<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
) -> std::io::Result<(Digest, u64)> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; StoreConfig::HASH_CHUNK_SIZE];
    let mut size: u64 = 0;

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
        writer.write_all(&buffer[..bytes_read])?;
        size += bytes_read as u64;
    }

    let digest = Digest {
        hex: hex::encode(hasher.finalize()),
    };
    Ok((digest, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_digest_of_empty() {
        let digest = Digest::of_bytes(b"");
        assert_eq!(digest.hex(), EMPTY_SHA256);
        assert_eq!(digest.to_string(), format!("sha256-{}", EMPTY_SHA256));
        assert_eq!(digest.filename(), digest.to_string());
    }

    #[test]
    fn test_parse_accepts_both_separators() {
        let dash = Digest::parse(&format!("sha256-{}", EMPTY_SHA256)).unwrap();
        let colon = Digest::parse(&format!("sha256:{}", EMPTY_SHA256)).unwrap();
        let upper = Digest::parse(&format!("sha256:{}", EMPTY_SHA256.to_uppercase())).unwrap();
        assert_eq!(dash, colon);
        assert_eq!(dash, upper);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in [
            "",
            "sha256-",
            "sha256-abc",
            "md5-d41d8cd98f00b204e9800998ecf8427e",
            format!("sha512-{}", EMPTY_SHA256).as_str(),
            format!("sha256-{}z", &EMPTY_SHA256[..63]).as_str(),
        ] {
            assert!(Digest::parse(bad).is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_from_filename_skips_non_canonical() {
        assert!(Digest::from_filename(&format!("sha256-{}", EMPTY_SHA256)).is_some());
        assert!(Digest::from_filename(".tmp-abc123").is_none());
        assert!(Digest::from_filename(&format!("sha256:{}", EMPTY_SHA256)).is_none());
        assert!(Digest::from_filename(&format!("sha256-{}", EMPTY_SHA256.to_uppercase())).is_none());
    }

    #[test]
    fn test_hash_copy_matches_of_bytes() {
        let data = vec![7u8; 3 * 1024 * 1024 + 17];
        let mut out = Vec::new();
        let (digest, size) = hash_copy(&mut data.as_slice(), &mut out).unwrap();
        assert_eq!(size, data.len() as u64);
        assert_eq!(out, data);
        assert_eq!(digest, Digest::of_bytes(&data));
    }

    #[test]
    fn test_serde_uses_canonical_form() {
        let digest = Digest::parse(&format!("sha256:{}", EMPTY_SHA256)).unwrap();
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"sha256-{}\"", EMPTY_SHA256));

        let err = serde_json::from_str::<Digest>("\"sha256-nope\"");
        assert!(err.is_err());
    }
}
