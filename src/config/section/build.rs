//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! packages = "src"                # one sub-directory per userscript package
//! output = "build"                # build root: per-package cache + aggregate
//! output_filename = "index.js"    # aggregate file name inside the build root
//! libs = ["frontend-utils"]       # shared code; a change here rebuilds everything
//! minify = "auto"                 # auto | always | never
//! ignore = ["node_modules"]       # excluded from package fingerprints
//! # template = "entrypoint.js"    # custom entrypoint template
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::MinifyPolicy;

/// Build settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSectionConfig {
    /// Directory whose immediate sub-directories are packages.
    pub packages: PathBuf,

    /// Build root holding one cache directory per package.
    pub output: PathBuf,

    /// File name of the aggregate written into the build root.
    pub output_filename: String,

    /// Shared-library directories watched alongside the packages.
    pub libs: Vec<PathBuf>,

    /// Minify override.
    pub minify: MinifyPolicy,

    /// Directory names excluded from fingerprints.
    pub ignore: Vec<String>,

    /// Optional entrypoint template replacing the embedded one.
    pub template: Option<PathBuf>,
}

impl Default for BuildSectionConfig {
    fn default() -> Self {
        Self {
            packages: "src".into(),
            output: "build".into(),
            output_filename: "index.js".into(),
            libs: Vec::new(),
            minify: MinifyPolicy::Auto,
            ignore: vec!["node_modules".into()],
            template: None,
        }
    }
}

impl BuildSectionConfig {
    /// Absolute path of the aggregate output file.
    pub fn output_file(&self) -> PathBuf {
        self.output.join(&self.output_filename)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use crate::core::MinifyPolicy;
    use std::path::PathBuf;

    #[test]
    fn test_build_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.build.packages, PathBuf::from("src"));
        assert_eq!(config.build.output, PathBuf::from("build"));
        assert_eq!(config.build.output_filename, "index.js");
        assert_eq!(config.build.minify, MinifyPolicy::Auto);
        assert_eq!(config.build.ignore, vec!["node_modules".to_string()]);
        assert!(config.build.libs.is_empty());
        assert!(config.build.template.is_none());
    }

    #[test]
    fn test_build_overrides() {
        let config = test_parse_config(
            "[build]\npackages = \"scripts\"\nlibs = [\"shared\", \"vendor\"]\nminify = \"never\"",
        );
        assert_eq!(config.build.packages, PathBuf::from("scripts"));
        assert_eq!(config.build.libs.len(), 2);
        assert_eq!(config.build.minify, MinifyPolicy::Never);
        // untouched fields keep defaults
        assert_eq!(config.build.output_filename, "index.js");
    }
}
