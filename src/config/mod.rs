//! Project configuration management for `uspack.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── build      # [build]
//! │   ├── bundler    # [bundler]
//! │   ├── serve      # [serve]
//! │   └── watch      # [watch]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError
//! │   └── handle     # Global config handle
//! └── mod.rs         # AppConfig (this file)
//! ```
//!
//! The config file is optional. Without one every section takes its
//! defaults and the project root is the current directory.

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{BuildSectionConfig, BundlerConfig, ServeConfig, WatchConfig};
pub use types::{ConfigDiagnostics, ConfigError, cfg, init_config};

use crate::{
    cli::{BuildArgs, Cli, Commands},
    debug, log,
    utils::path::normalize_path,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing uspack.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub build: BuildSectionConfig,

    #[serde(default)]
    pub bundler: BundlerConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

impl AppConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd for the config file. The project root is the
    /// config file's parent, or cwd when no config file exists.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let (mut config, root) = match find_config_file(&cli.config, &cwd) {
            Some(path) => {
                let config = Self::from_path(&path)?;
                let root = path.parent().map(Path::to_path_buf).unwrap_or(cwd);
                (Self { config_path: path, ..config }, root)
            }
            None => {
                debug!("config"; "{} not found, using defaults", cli.config.display());
                (Self::default(), cwd)
            }
        };

        config.apply_command_options(cli);
        config.normalize_paths(&root);
        config.validate(cli)?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    #[cfg(test)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            let display_path = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_else(|| path.to_string_lossy());
            log!("warning"; "unknown fields in {}, ignoring:", display_path);
            for field in &ignored {
                eprintln!("- {field}");
            }
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Get path relative to the project root
    pub fn root_relative(&self, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref()
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.as_ref().to_path_buf())
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli) {
        match &cli.command {
            Commands::Build { build_args, .. } => self.apply_build_args(build_args),
            Commands::Serve {
                build_args,
                interface,
                port,
                watch,
                poll,
                interval,
            } => {
                self.apply_build_args(build_args);
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
                Self::update_option(&mut self.serve.watch, watch.as_ref());
                Self::update_option(&mut self.watch.interval_ms, interval.as_ref());
                self.watch.poll |= *poll;
            }
            Commands::Pack { .. } | Commands::Which { .. } => {}
        }
    }

    fn apply_build_args(&mut self, args: &BuildArgs) {
        Self::update_option(&mut self.build.packages, args.packages.as_ref());
        Self::update_option(&mut self.build.output, args.output.as_ref());
        Self::update_option(&mut self.build.minify, args.minify.as_ref());
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // path normalization
    // ========================================================================

    /// Normalize all paths relative to root directory.
    fn normalize_paths(&mut self, root: &Path) {
        let root = normalize_path(root);

        if !self.config_path.as_os_str().is_empty() {
            self.config_path = normalize_path(&self.config_path);
        }

        self.build.packages = normalize_path(&root.join(&self.build.packages));
        self.build.output = normalize_path(&root.join(&self.build.output));
        self.build.libs = self
            .build
            .libs
            .iter()
            .map(|p| normalize_path(&root.join(p)))
            .collect();
        if let Some(template) = self.build.template.take() {
            self.build.template = Some(normalize_path(&root.join(template)));
        }

        self.root = root;
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate configuration for the current command.
    ///
    /// Collects all validation errors and returns them at once.
    pub fn validate(&self, cli: &Cli) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        if self.bundler.command.iter().all(|arg| arg.trim().is_empty()) {
            diag.error_with_hint(
                "bundler.command",
                "bundler command is empty",
                "e.g. command = [\"npx\", \"esbuild\", \"$USPACK_ENTRY\", \"--bundle\"]",
            );
        }

        if self.watch.interval_ms == 0 {
            diag.error("watch.interval_ms", "must be greater than zero");
        }

        let name = &self.build.output_filename;
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            diag.error_with_hint(
                "build.output_filename",
                format!("`{name}` is not a plain file name"),
                "use a file name such as \"index.js\"",
            );
        }

        if let Some(template) = &self.build.template
            && !template.is_file()
        {
            diag.error(
                "build.template",
                format!("template `{}` not found", template.display()),
            );
        }

        if !matches!(cli.command, Commands::Pack { .. }) && !self.build.packages.is_dir() {
            diag.error_with_hint(
                "build.packages",
                format!(
                    "package directory `{}` not found",
                    self.root_relative(&self.build.packages).display()
                ),
                "create it or pass --packages",
            );
        }

        for lib in &self.build.libs {
            if !lib.exists() {
                log!("warning"; "library directory `{}` not found", self.root_relative(lib).display());
            }
        }

        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> AppConfig {
    let (parsed, ignored) = AppConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
