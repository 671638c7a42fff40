//! External bundler process.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use super::{BundleError, Bundler, Diagnostic};
use crate::config::BundlerConfig;
use crate::core::BuildMode;
use crate::debug;
use crate::utils::exec::{Cmd, output_lines};

const VAR_ENTRY: &str = "$USPACK_ENTRY";
const VAR_OUTPUT: &str = "$USPACK_OUTPUT";
const VAR_MODE: &str = "$USPACK_MODE";
const VAR_ROOT: &str = "$USPACK_ROOT";
const VAR_LIBS: &str = "$USPACK_LIBS";

/// Runs the configured `[bundler]` command once per bundle.
///
/// The bundle is read back from `$USPACK_OUTPUT`. A command that never
/// mentions `$USPACK_OUTPUT` is expected to print the bundle on stdout.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    config: BundlerConfig,
    root: PathBuf,
    libs: Vec<PathBuf>,
}

impl CommandBundler {
    pub fn new(config: BundlerConfig, root: impl Into<PathBuf>, libs: Vec<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
            libs,
        }
    }

    fn libs_var(&self) -> String {
        std::env::join_paths(&self.libs)
            .unwrap_or_else(|_| OsString::new())
            .to_string_lossy()
            .into_owned()
    }

    /// `(placeholder, value)` pairs for one invocation.
    fn vars(&self, entry: &Path, output: &Path, mode: BuildMode) -> [(&'static str, String); 5] {
        [
            (VAR_ENTRY, entry.to_string_lossy().into_owned()),
            (VAR_OUTPUT, output.to_string_lossy().into_owned()),
            (VAR_MODE, mode.as_str().to_string()),
            (VAR_ROOT, self.root.to_string_lossy().into_owned()),
            (VAR_LIBS, self.libs_var()),
        ]
    }

    /// Command line with variables substituted and mode arguments appended.
    fn resolve_args(&self, vars: &[(&'static str, String)], mode: BuildMode) -> Vec<String> {
        let mode_args = if mode.is_production() {
            &self.config.production_args
        } else {
            &self.config.development_args
        };

        self.config
            .command
            .iter()
            .chain(mode_args)
            .map(|arg| {
                vars.iter()
                    .fold(arg.clone(), |acc, (name, value)| acc.replace(name, value))
            })
            .collect()
    }

    fn writes_output_file(&self) -> bool {
        self.config
            .command
            .iter()
            .chain(&self.config.production_args)
            .chain(&self.config.development_args)
            .any(|arg| arg.contains(VAR_OUTPUT))
    }
}

impl Bundler for CommandBundler {
    fn bundle(&self, entry: &Path, mode: BuildMode) -> Result<String, BundleError> {
        let scratch = tempfile::Builder::new()
            .prefix("uspack-bundle-")
            .tempdir()
            .map_err(|e| BundleError::message(format!("failed to create scratch dir: {e}")))?;
        let output_path = scratch.path().join("bundle.js");

        let vars = self.vars(entry, &output_path, mode);
        let args = self.resolve_args(&vars, mode);

        let mut envs: Vec<(String, String)> = vars
            .iter()
            .map(|(name, value)| (name.trim_start_matches('$').to_string(), value.clone()))
            .collect();
        if !self.libs.is_empty() {
            envs.push(("NODE_PATH".to_string(), self.libs_var()));
        }

        let cwd = entry.parent().unwrap_or(&self.root);
        let output = Cmd::from_slice(&args)
            .cwd(cwd)
            .envs(envs)
            .run()
            .map_err(|e| BundleError::message(format!("{e:#}")))?;

        if !output.status.success() {
            let mut diagnostics: Vec<Diagnostic> =
                output_lines(&output).into_iter().map(Diagnostic::new).collect();
            if diagnostics.is_empty() {
                diagnostics.push(Diagnostic::new(format!("bundler exited with {}", output.status)));
            }
            return Err(BundleError::new(diagnostics));
        }

        let content = if self.writes_output_file() {
            fs::read_to_string(&output_path).map_err(|e| {
                BundleError::message(format!(
                    "bundler produced no output at `{}`: {e}",
                    output_path.display()
                ))
            })?
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };

        debug!("compile"; "{} -> {} bytes ({})", entry.display(), content.len(), mode);
        Ok(content)
    }
}
