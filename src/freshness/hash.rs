//! Content hashing using blake3.
//!
//! A package fingerprint is a pure function of the relative paths and bytes
//! of every regular file under the package directory. Timestamps,
//! permissions and traversal order do not contribute.

use jwalk::WalkDir;
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string (the on-disk form).
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Create from hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display first 16 chars of hex for brevity
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Hash an in-memory buffer.
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    ContentHash::new(*blake3::hash(bytes).as_bytes())
}

/// Stream a file through blake3.
pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
    let file = File::open(path)?;

    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(ContentHash::new(*hasher.finalize().as_bytes()))
}

/// Fingerprint a directory tree.
///
/// Directories whose name appears in `ignore` are pruned at any depth.
/// Any unreadable entry fails the whole fingerprint.
pub fn fingerprint_dir(dir: &Path, ignore: &[String]) -> io::Result<ContentHash> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("`{}` is not a directory", dir.display()),
        ));
    }

    let ignore = ignore.to_vec();
    let walker = WalkDir::new(dir)
        .skip_hidden(false)
        .process_read_dir(move |_, _, _, children| {
            children.retain(|entry| match entry {
                Ok(e) => {
                    !(e.file_type.is_dir()
                        && ignore.iter().any(|name| e.file_name.to_str() == Some(name)))
                }
                Err(_) => true,
            });
        });

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| io::Error::other(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((rel, path));
    }
    files.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    let hashes = files
        .par_iter()
        .map(|(_, path)| hash_file(path))
        .collect::<io::Result<Vec<_>>>()?;

    let mut hasher = blake3::Hasher::new();
    for ((rel, _), hash) in files.iter().zip(&hashes) {
        hasher.update(rel.as_bytes());
        hasher.update(&[0]);
        hasher.update(hash.as_bytes());
    }

    Ok(ContentHash::new(*hasher.finalize().as_bytes()))
}
