//! The bundler capability.
//!
//! Bundling is opaque to the rest of the crate: an entry file goes in, a
//! self-contained script comes out, or the bundler reports diagnostics.
//! [`CommandBundler`] drives an external program; tests substitute their
//! own [`Bundler`] implementations.

mod command;

pub use command::CommandBundler;

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::core::BuildMode;

/// Source-to-bundle transformer.
///
/// Calls are synchronous and never concurrent within one build session.
pub trait Bundler: Send + Sync {
    fn bundle(&self, entry: &Path, mode: BuildMode) -> Result<String, BundleError>;
}

/// One message reported by the bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Bundling failed.
#[derive(Debug, Clone, Error)]
#[error("{}", .diagnostics.first().map_or("bundler failed", |d| d.message.as_str()))]
pub struct BundleError {
    pub diagnostics: Vec<Diagnostic>,
}

impl BundleError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    /// Single-diagnostic error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(vec![Diagnostic::new(message)])
    }

    /// All diagnostics, one per line.
    pub fn detail(&self) -> String {
        self.diagnostics
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
