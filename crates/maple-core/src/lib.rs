//! Maple Core - content-addressed storage for versioned policy model bundles.
//!
//! Model artifacts are downloaded once and reused across invocations. Each
//! distinct byte sequence is stored once as a blob named by its SHA256
//! digest; a manifest groups a config blob and layer blobs under a
//! `name:tag` reference. Removing a reference reclaims only the blobs no
//! other manifest still names.
//!
//! The store is plain files under one root, shared by a long-lived daemon
//! and short-lived CLI processes. Coordination goes through an advisory
//! lock file, never through in-memory state.
//!
//! # Example
//!
//! ```rust,no_run
//! use maple_core::{MediaType, ModelConfig, Store, SweepPolicy};
//!
//! fn main() -> maple_core::Result<()> {
//!     let store = Store::from_env()?;
//!     let reference = Store::resolve("openvla:7b");
//!
//!     let config = ModelConfig {
//!         architecture: "openvla".into(),
//!         action_dim: 7,
//!         ..Default::default()
//!     };
//!     let weights = std::fs::File::open("model.safetensors")?;
//!     store.import_bundle(&reference, &config, [(MediaType::Weights, weights)])?;
//!
//!     for bundle in store.list_bundles()? {
//!         println!("{} {:?}", bundle.reference, bundle.size);
//!     }
//!
//!     let report = store.delete_reference(&reference, SweepPolicy::Conservative)?;
//!     println!("reclaimed {} blob(s)", report.removed_count());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod platform;
pub mod storage;

mod store;

pub use config::{MediaType, StoreConfig};
pub use error::{ErrorKind, MapleError, ObjectKind, Result};
pub use platform::StorePaths;
pub use storage::{
    BlobStore, Digest, GarbageCollector, Layer, LockMode, Manifest, ManifestStore, ModelConfig,
    PruneReport, Reference, ReferenceScan, RemovalReport, StoreLock, SweepPolicy,
};
pub use store::{BundleSummary, IntegrityReport, Store};
