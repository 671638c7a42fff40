//! `package.json` reading.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const MANIFEST_FILE: &str = "package.json";

const DEFAULT_MAIN: &str = "index.js";

/// A discovered userscript package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Unique key across the registry.
    pub name: String,
    /// Absolute source directory.
    pub dir: PathBuf,
    /// Entry file relative to `dir`.
    pub main: PathBuf,
    /// URL match patterns, in manifest order.
    pub matches: Vec<String>,
    /// Preferred build mode when the minify policy is `auto`.
    pub is_production: bool,
}

impl Package {
    /// Absolute path of the entry file.
    pub fn entry(&self) -> PathBuf {
        self.dir.join(&self.main)
    }

    /// Read `dir/package.json`.
    ///
    /// Returns `Ok(None)` when the directory has no manifest at all.
    pub fn read(dir: &Path) -> Result<Option<Self>, ManifestError> {
        let path = dir.join(MANIFEST_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ManifestError::Io(path, e)),
        };
        Self::parse(dir, &content).map(Some)
    }

    /// Parse manifest text for a package rooted at `dir`.
    pub fn parse(dir: &Path, content: &str) -> Result<Self, ManifestError> {
        let path = dir.join(MANIFEST_FILE);
        let raw: RawManifest =
            serde_json::from_str(content).map_err(|e| ManifestError::Json(path.clone(), e))?;

        let name = raw
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ManifestError::MissingName(path.clone()))?;

        let user_script = raw.user_script.unwrap_or_default();
        let matches = match user_script.matches {
            Some(Matches::One(pattern)) => vec![pattern],
            Some(Matches::Many(patterns)) if !patterns.is_empty() => patterns,
            _ => return Err(ManifestError::MissingMatches(path)),
        };

        Ok(Self {
            name,
            dir: dir.to_path_buf(),
            main: raw.main.unwrap_or_else(|| DEFAULT_MAIN.to_string()).into(),
            matches,
            is_production: user_script.is_production.unwrap_or(true),
        })
    }
}

/// A package whose manifest could not be used.
///
/// The package is excluded from the registry; other packages are unaffected.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("invalid JSON in `{0}`")]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("`name` is missing from `{0}`")]
    MissingName(PathBuf),

    #[error("`userScript.matches` is missing from `{0}`")]
    MissingMatches(PathBuf),
}

#[derive(Deserialize)]
struct RawManifest {
    name: Option<String>,
    main: Option<String>,
    #[serde(rename = "userScript")]
    user_script: Option<RawUserScript>,
}

#[derive(Deserialize, Default)]
struct RawUserScript {
    matches: Option<Matches>,
    #[serde(rename = "isProduction")]
    is_production: Option<bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Matches {
    One(String),
    Many(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_defaults() {
        let pkg = Package::parse(
            Path::new("/src/alpha"),
            r#"{"name":"alpha","userScript":{"matches":"https://a.example/*"}}"#,
        )
        .unwrap();

        assert_eq!(pkg.name, "alpha");
        assert_eq!(pkg.main, PathBuf::from("index.js"));
        assert_eq!(pkg.matches, vec!["https://a.example/*"]);
        assert!(pkg.is_production);
        assert_eq!(pkg.entry(), PathBuf::from("/src/alpha/index.js"));
    }

    #[test]
    fn test_parse_full() {
        let pkg = Package::parse(
            Path::new("/src/beta"),
            r#"{
                "name": "beta",
                "main": "lib/main.js",
                "userScript": { "matches": ["https://b.example/*", "*://c.example/x"], "isProduction": false }
            }"#,
        )
        .unwrap();

        assert_eq!(pkg.main, PathBuf::from("lib/main.js"));
        assert_eq!(pkg.matches.len(), 2);
        assert!(!pkg.is_production);
    }

    #[test]
    fn test_missing_matches() {
        let err = Package::parse(Path::new("/x"), r#"{"name":"x","userScript":{}}"#).unwrap_err();
        assert!(matches!(err, ManifestError::MissingMatches(_)));

        let err = Package::parse(Path::new("/x"), r#"{"name":"x"}"#).unwrap_err();
        assert!(matches!(err, ManifestError::MissingMatches(_)));

        let err =
            Package::parse(Path::new("/x"), r#"{"name":"x","userScript":{"matches":[]}}"#).unwrap_err();
        assert!(matches!(err, ManifestError::MissingMatches(_)));
    }

    #[test]
    fn test_missing_name_and_bad_json() {
        let err = Package::parse(Path::new("/x"), r#"{"userScript":{"matches":"*"}}"#).unwrap_err();
        assert!(matches!(err, ManifestError::MissingName(_)));

        let err = Package::parse(Path::new("/x"), "{ not json").unwrap_err();
        assert!(matches!(err, ManifestError::Json(..)));
        assert!(err.to_string().contains("package.json"));
    }

    #[test]
    fn test_read_without_manifest() {
        let dir = TempDir::new().unwrap();
        assert!(Package::read(dir.path()).unwrap().is_none());
    }
}
