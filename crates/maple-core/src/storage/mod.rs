//! Content-addressed artifact storage.
//!
//! # Architecture
//!
//! ```text
//! StorePaths (root, blobs/, manifests/, .lock)
//!     │
//!     ├── BlobStore - write-once objects keyed by sha256 digest
//!     │
//!     ├── ManifestStore - JSON manifests keyed by (name, tag)
//!     │       └── Reference - "name[:tag]" parsing
//!     │
//!     ├── ModelConfig - typed view of a manifest's config blob
//!     │
//!     └── GarbageCollector - reachability sweep on reference removal
//! ```

mod atomic;
mod blob;
mod digest;
mod gc;
mod lock;
mod manifest;
mod model_config;
mod reference;

pub use atomic::{atomic_read_json, atomic_write, atomic_write_json};
pub use blob::BlobStore;
pub use digest::Digest;
pub use gc::{GarbageCollector, PruneReport, RemovalReport, SweepPolicy};
pub use lock::{LockMode, StoreLock};
pub use manifest::{Layer, Manifest, ManifestStore, ReferenceScan};
pub use model_config::ModelConfig;
pub use reference::Reference;
