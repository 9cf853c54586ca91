//! Error types for the maple store.
//!
//! Three kinds matter to callers: an object is absent (`NotFound`), an object
//! is present but does not parse or hash to its name (`Corrupt`), or the
//! filesystem failed underneath us (`Io`). Re-writing identical content is
//! never an error.

use std::path::PathBuf;
use thiserror::Error;

/// What kind of stored object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Manifest,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Blob => f.write_str("blob"),
            ObjectKind::Manifest => f.write_str("manifest"),
        }
    }
}

/// Main error type for the maple store.
#[derive(Debug, Error)]
pub enum MapleError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: ObjectKind, id: String },

    #[error("Corrupt data at {path:?}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    #[error("Invalid reference {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Coarse classification used by front-ends to decide how to report an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Corrupt,
    Io,
    Invalid,
    Other,
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, MapleError>;

impl From<std::io::Error> for MapleError {
    fn from(err: std::io::Error) -> Self {
        MapleError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl MapleError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        MapleError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    pub fn blob_not_found(id: impl Into<String>) -> Self {
        MapleError::NotFound {
            kind: ObjectKind::Blob,
            id: id.into(),
        }
    }

    pub fn manifest_not_found(id: impl Into<String>) -> Self {
        MapleError::NotFound {
            kind: ObjectKind::Manifest,
            id: id.into(),
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        MapleError::Corrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MapleError::NotFound { .. } => ErrorKind::NotFound,
            MapleError::Corrupt { .. } => ErrorKind::Corrupt,
            MapleError::Io { .. } => ErrorKind::Io,
            MapleError::InvalidDigest(_) | MapleError::InvalidReference { .. } => {
                ErrorKind::Invalid
            }
            MapleError::Config { .. } | MapleError::Other(_) => ErrorKind::Other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Process exit code for the CLI.
    ///
    /// - 2: object not found
    /// - 3: corrupt data on disk (investigate, do not re-import blindly)
    /// - 4: filesystem failure
    /// - 1: everything else
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::NotFound => 2,
            ErrorKind::Corrupt => 3,
            ErrorKind::Io => 4,
            ErrorKind::Invalid | ErrorKind::Other => 1,
        }
    }
}
