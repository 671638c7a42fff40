//! Aggregate assembly: every current artifact becomes one module of a
//! generated entrypoint, which is then bundled once more.
//!
//! ```text
//! <scratch>/
//! ├── alpha.js        # cached bundle of package `alpha`
//! ├── beta.js
//! ├── index.js        # expanded entrypoint template
//! └── package.json
//! ```

mod template;

pub use template::{LoopItem, expand};

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::cache::BuildArtifact;
use crate::compiler::{BundleError, Bundler};
use crate::core::BuildMode;
use crate::utils::path::safe_component;

const ENTRY_FILE: &str = "index.js";

const ENTRY_MANIFEST: &str = r#"{"name":"uspack-aggregate","main":"index.js","version":"1","private":true}"#;

/// Whole-session failure: nothing is published.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("entrypoint template: {0}")]
    Template(String),

    #[error("failed to stage `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("aggregate bundling failed: {0}")]
    Bundle(#[source] BundleError),
}

/// Build the aggregate from `artifacts`, in the given order.
pub fn assemble(
    bundler: &dyn Bundler,
    template: &str,
    artifacts: &[BuildArtifact],
    stamp: &str,
    mode: BuildMode,
) -> Result<String, AssemblyError> {
    let scratch = tempfile::Builder::new()
        .prefix("uspack-assemble-")
        .tempdir()
        .map_err(|e| AssemblyError::Io(std::env::temp_dir(), e))?;
    let dir = scratch.path();

    let mut items = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let file = format!("{}.js", safe_component(&artifact.name));
        let path = dir.join(&file);
        fs::write(&path, &artifact.content).map_err(|e| AssemblyError::Io(path, e))?;
        items.push(LoopItem {
            name: &artifact.name,
            matches: &artifact.matches,
            require_name: format!("./{file}"),
        });
    }

    let entry = dir.join(ENTRY_FILE);
    let source = expand(template, &items, stamp)?;
    fs::write(&entry, source).map_err(|e| AssemblyError::Io(entry.clone(), e))?;

    let manifest = dir.join("package.json");
    fs::write(&manifest, ENTRY_MANIFEST).map_err(|e| AssemblyError::Io(manifest, e))?;

    bundler.bundle(&entry, mode).map_err(AssemblyError::Bundle)
}
