//! Cache entries and the store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{BUNDLE_FILE, INFO_FILE};
use crate::debug;
use crate::freshness::ContentHash;
use crate::utils::path::safe_component;

/// One compiled package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub name: String,
    pub fingerprint: ContentHash,
    pub matches: Vec<String>,
    pub content: String,
}

/// `info.json` contents.
#[derive(Debug, Serialize, Deserialize)]
struct CacheInfo {
    name: String,
    fingerprint: String,
    #[serde(rename = "urlMatchPatterns")]
    url_match_patterns: Vec<String>,
}

/// A cache entry that could not be read or written.
///
/// Callers treat every variant as a cache miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("malformed cache metadata `{0}`")]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("corrupt cache entry `{0}`: {1}")]
    Corrupt(PathBuf, String),
}

/// Whether a stored artifact is still valid for the live fingerprint.
#[inline]
pub fn is_valid(artifact: &BuildArtifact, live: &ContentHash) -> bool {
    artifact.fingerprint == *live
}

/// Per-package artifact store rooted at the build directory.
#[derive(Debug, Clone)]
pub struct BuildCache {
    root: PathBuf,
}

impl BuildCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding `name`'s entry.
    pub fn entry_dir(&self, name: &str) -> PathBuf {
        self.root.join(safe_component(name))
    }

    /// Load `name`'s entry. `Ok(None)` when no entry exists.
    pub fn load(&self, name: &str) -> Result<Option<BuildArtifact>, CacheError> {
        let dir = self.entry_dir(name);
        let info_path = dir.join(INFO_FILE);

        let info = match fs::read_to_string(&info_path) {
            Ok(info) => info,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io(info_path, e)),
        };
        let info: CacheInfo =
            serde_json::from_str(&info).map_err(|e| CacheError::Json(info_path.clone(), e))?;

        if info.name != name {
            return Err(CacheError::Corrupt(
                dir,
                format!("entry belongs to `{}`", info.name),
            ));
        }
        let fingerprint = ContentHash::from_hex(&info.fingerprint)
            .ok_or_else(|| CacheError::Corrupt(info_path, "invalid fingerprint".into()))?;

        let bundle_path = dir.join(BUNDLE_FILE);
        let content =
            fs::read_to_string(&bundle_path).map_err(|e| CacheError::Io(bundle_path, e))?;

        Ok(Some(BuildArtifact {
            name: info.name,
            fingerprint,
            matches: info.url_match_patterns,
            content,
        }))
    }

    /// Persist an artifact, replacing any previous entry.
    ///
    /// The entry is staged in a scratch directory and renamed into place, so
    /// a failed write leaves the prior entry intact.
    pub fn store(&self, artifact: &BuildArtifact) -> Result<(), CacheError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |e| CacheError::Io(path, e)
        };

        fs::create_dir_all(&self.root).map_err(io_err(&self.root))?;
        let dir = self.entry_dir(&artifact.name);

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)
            .map_err(io_err(&self.root))?;
        let staged = staging.path().join("entry");
        fs::create_dir(&staged).map_err(io_err(&staged))?;

        let info = CacheInfo {
            name: artifact.name.clone(),
            fingerprint: artifact.fingerprint.to_hex(),
            url_match_patterns: artifact.matches.clone(),
        };
        let info = serde_json::to_string(&info)
            .map_err(|e| CacheError::Json(staged.join(INFO_FILE), e))?;
        fs::write(staged.join(BUNDLE_FILE), &artifact.content)
            .map_err(io_err(&staged.join(BUNDLE_FILE)))?;
        fs::write(staged.join(INFO_FILE), info).map_err(io_err(&staged.join(INFO_FILE)))?;

        // Move the previous entry aside; it is deleted with `retired`.
        let retired = tempfile::Builder::new()
            .prefix(".retired-")
            .tempdir_in(&self.root)
            .map_err(io_err(&self.root))?;
        let old = retired.path().join("entry");
        let had_previous = match fs::rename(&dir, &old) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(CacheError::Io(dir, e)),
        };

        if let Err(e) = fs::rename(&staged, &dir) {
            if had_previous {
                let _ = fs::rename(&old, &dir);
            }
            return Err(CacheError::Io(dir, e));
        }

        debug!("cache"; "stored {} ({})", artifact.name, artifact.fingerprint);
        Ok(())
    }
}
