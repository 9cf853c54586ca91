//! Centralized configuration for the maple store.
//!
//! Directory names, environment variables and media types live here so the
//! on-disk layout is defined in exactly one place.

/// Store layout and environment configuration.
pub struct StoreConfig;

impl StoreConfig {
    /// Directory under the user's home holding the store.
    pub const HOME_DIR_NAME: &'static str = ".maple";
    pub const BLOBS_DIR_NAME: &'static str = "blobs";
    pub const MANIFESTS_DIR_NAME: &'static str = "manifests";
    pub const LOCK_FILE_NAME: &'static str = ".lock";

    /// Prefix of in-flight temp files. Entries starting with `.` are never
    /// treated as blobs or tags.
    pub const TEMP_PREFIX: &'static str = ".tmp-";

    /// Overrides the store root when set and non-empty.
    pub const HOME_ENV: &'static str = "MAPLE_HOME";
    /// Log filter for the CLI (`tracing_subscriber::EnvFilter` syntax).
    pub const LOG_LEVEL_ENV: &'static str = "MAPLE_LOG_LEVEL";

    pub const DEFAULT_TAG: &'static str = "latest";
    pub const SCHEMA_VERSION: u32 = 2;

    /// Read buffer used while hashing blob streams.
    pub const HASH_CHUNK_SIZE: usize = 1024 * 1024;
}

/// Media types recognized in manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Manifest,
    Config,
    Weights,
    License,
}

impl MediaType {
    pub const ALL: [MediaType; 4] = [
        MediaType::Manifest,
        MediaType::Config,
        MediaType::Weights,
        MediaType::License,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Manifest => "application/vnd.maple.manifest.v1+json",
            MediaType::Config => "application/vnd.maple.config.v1+json",
            MediaType::Weights => "application/vnd.maple.weights",
            MediaType::License => "application/vnd.maple.license",
        }
    }

    /// Returns `None` for media types this version does not know about.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_parse() {
        for m in MediaType::ALL {
            assert_eq!(MediaType::parse(m.as_str()), Some(m));
        }
        assert_eq!(MediaType::parse("application/octet-stream"), None);
    }

    #[test]
    fn test_temp_prefix_is_hidden() {
        assert!(StoreConfig::TEMP_PREFIX.starts_with('.'));
        assert!(StoreConfig::LOCK_FILE_NAME.starts_with('.'));
    }
}
