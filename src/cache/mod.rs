//! On-disk build cache: one directory per package under the build root.
//!
//! ```text
//! build/
//! ├── github-tweaks/
//! │   ├── bundle.js     # compiled bundle
//! │   └── info.json     # {"name", "fingerprint", "urlMatchPatterns"}
//! └── index.js          # aggregate (written by the orchestrator)
//! ```
//!
//! Entries are never invalidated by time; validity is always a fresh
//! fingerprint comparison.

mod entry;

pub use entry::{BuildArtifact, BuildCache, CacheError, is_valid};

/// Bundle file inside a cache entry.
pub(crate) const BUNDLE_FILE: &str = "bundle.js";

/// Metadata file inside a cache entry.
pub(crate) const INFO_FILE: &str = "info.json";
