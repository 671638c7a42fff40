//! Package discovery.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use thiserror::Error;

use super::{ManifestError, Package, matches_any};
use crate::{debug, log, utils::path::safe_component};

/// Discovery failures that abort the whole scan.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read package root `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("duplicate package name `{name}` in `{}` and `{}`", first.display(), second.display())]
    Duplicate {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Snapshot of every package under the package root.
///
/// Order is sorted directory-name order, stable across platforms.
#[derive(Debug, Default, Clone)]
pub struct PackageRegistry {
    packages: Vec<Package>,
    by_name: FxHashMap<String, usize>,
    /// Directories whose manifest was rejected, kept so a later fix is noticed.
    rejected: Vec<PathBuf>,
}

impl PackageRegistry {
    /// Scan the immediate sub-directories of `root`.
    ///
    /// Directories without a manifest are skipped silently. A bad manifest
    /// excludes its package with a warning. Duplicate names fail the scan.
    pub fn discover(root: &Path) -> Result<Self, RegistryError> {
        Self::discover_reserving(root, &[])
    }

    /// Like [`Self::discover`], but a package whose cache directory would be
    /// one of `reserved` (a file in the build root) is excluded with a warning.
    pub fn discover_reserving(root: &Path, reserved: &[String]) -> Result<Self, RegistryError> {
        let entries = fs::read_dir(root).map_err(|e| RegistryError::Io(root.to_path_buf(), e))?;

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .map(|e| e.path())
            .collect();
        dirs.sort();

        let mut registry = Self::default();
        for dir in dirs {
            match Package::read(&dir) {
                Ok(Some(package)) if reserved.contains(&safe_component(&package.name)) => {
                    log!(
                        "registry";
                        "ignoring package: name `{}` in `{}` clashes with the aggregate output",
                        package.name,
                        dir.display()
                    );
                    registry.rejected.push(dir);
                }
                Ok(Some(package)) => registry.insert(package)?,
                Ok(None) => debug!("registry"; "skipping {} (no manifest)", dir.display()),
                Err(e) => {
                    log!("registry"; "ignoring package: {}", format_manifest_error(&e));
                    registry.rejected.push(dir);
                }
            }
        }

        debug!("registry"; "{} packages under {}", registry.len(), root.display());
        Ok(registry)
    }

    /// Names must stay distinct after sanitizing, since they key cache
    /// directories and bundled module files.
    fn insert(&mut self, package: Package) -> Result<(), RegistryError> {
        let key = safe_component(&package.name);
        if let Some(existing) = self.packages.iter().find(|p| safe_component(&p.name) == key) {
            return Err(RegistryError::Duplicate {
                name: package.name,
                first: existing.dir.clone(),
                second: package.dir,
            });
        }
        self.by_name.insert(package.name.clone(), self.packages.len());
        self.packages.push(package);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Package> {
        self.by_name.get(name).map(|&idx| &self.packages[idx])
    }

    /// Packages in discovery order.
    pub fn iter(&self) -> std::slice::Iter<'_, Package> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Source directories of registered and rejected packages.
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.packages
            .iter()
            .map(|p| p.dir.clone())
            .chain(self.rejected.iter().cloned())
            .collect()
    }

    /// Package owning `path` by longest directory prefix.
    pub fn owner_of(&self, path: &Path) -> Option<&Package> {
        self.packages
            .iter()
            .filter(|p| path.starts_with(&p.dir))
            .max_by_key(|p| p.dir.components().count())
    }

    /// Packages whose patterns accept `url`, in registry order.
    pub fn matching<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a Package> + 'a {
        self.packages
            .iter()
            .filter(move |p| matches_any(&p.matches, url))
    }
}

impl<'a> IntoIterator for &'a PackageRegistry {
    type Item = &'a Package;
    type IntoIter = std::slice::Iter<'a, Package>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn format_manifest_error(e: &ManifestError) -> String {
    match std::error::Error::source(e) {
        Some(source) => format!("{e}: {source}"),
        None => e.to_string(),
    }
}
