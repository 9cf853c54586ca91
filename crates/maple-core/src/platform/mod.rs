//! Platform-facing helpers.
//!
//! - `paths` - store root resolution and on-disk layout

pub mod paths;

pub use paths::StorePaths;
