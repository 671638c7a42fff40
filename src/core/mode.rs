//! Build mode passed to the bundler, and the policy that picks it.

use serde::{Deserialize, Serialize};

/// Bundler mode for a single compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMode {
    /// Minified output.
    Production,
    /// Readable output.
    Development,
}

impl BuildMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }

    #[inline]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global minify override.
///
/// - `auto`: each package's `userScript.isProduction` decides
/// - `always`: every package (and the aggregate) is built for production
/// - `never`: everything is built for development
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MinifyPolicy {
    #[default]
    Auto,
    Always,
    Never,
}

impl MinifyPolicy {
    /// Mode for one package given its manifest preference.
    pub const fn mode_for(self, is_production: bool) -> BuildMode {
        match self {
            Self::Always => BuildMode::Production,
            Self::Never => BuildMode::Development,
            Self::Auto if is_production => BuildMode::Production,
            Self::Auto => BuildMode::Development,
        }
    }

    /// Mode for the final aggregate pass (no manifest of its own).
    pub const fn aggregate_mode(self) -> BuildMode {
        match self {
            Self::Never => BuildMode::Development,
            Self::Auto | Self::Always => BuildMode::Production,
        }
    }

    pub const fn describe(self) -> &'static str {
        match self {
            Self::Auto => "depends on package.json",
            Self::Always => "always",
            Self::Never => "never",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_for() {
        assert_eq!(MinifyPolicy::Auto.mode_for(true), BuildMode::Production);
        assert_eq!(MinifyPolicy::Auto.mode_for(false), BuildMode::Development);
        assert_eq!(MinifyPolicy::Always.mode_for(false), BuildMode::Production);
        assert_eq!(MinifyPolicy::Never.mode_for(true), BuildMode::Development);
    }

    #[test]
    fn test_aggregate_mode() {
        assert_eq!(MinifyPolicy::Auto.aggregate_mode(), BuildMode::Production);
        assert_eq!(MinifyPolicy::Never.aggregate_mode(), BuildMode::Development);
    }
}
