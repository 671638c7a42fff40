//! Content fingerprints (blake3) for package source trees.

mod hash;

pub use hash::{ContentHash, fingerprint_dir, hash_bytes};
