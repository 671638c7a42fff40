//! External command execution utilities.
//!
//! Provides a Builder-based API for running external tools (the bundler)
//! with captured output.
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! let output = Cmd::from_slice(&["npx", "esbuild", "index.js", "--bundle"])
//!     .cwd(package_dir)
//!     .envs([("USPACK_MODE", "production")])
//!     .run()?;
//! ```

use anyhow::{Context, Result};
use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
};

/// Command builder for external process execution.
#[derive(Debug, Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Create from a command array (e.g., `["esbuild"]` or `["npx", "esbuild"]`).
    pub fn from_slice<S: AsRef<OsStr>>(cmd: &[S]) -> Self {
        let mut iter = cmd.iter();
        let program = iter
            .next()
            .map(|s| s.as_ref().to_owned())
            .unwrap_or_default();
        let args: Vec<_> = iter.map(|s| s.as_ref().to_owned()).collect();
        Self {
            program,
            args,
            ..Default::default()
        }
    }

    /// Add multiple arguments. Empty arguments are dropped.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            let arg = arg.as_ref();
            if !arg.is_empty() {
                self.args.push(arg.to_owned());
            }
        }
        self
    }

    /// Set working directory.
    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Set environment variables for the subprocess.
    pub fn envs<K, V, I>(mut self, vars: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in vars {
            self.envs.push((k.as_ref().to_owned(), v.as_ref().to_owned()));
        }
        self
    }

    /// Get the program name for error messages.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    /// Execute the command and capture its output.
    ///
    /// A non-zero exit status is NOT an error here; callers inspect
    /// `output.status` and turn stderr into their own diagnostics.
    pub fn run(self) -> Result<Output> {
        let name = self.program_name();
        if name.is_empty() {
            anyhow::bail!("empty command");
        }

        let program = which::which(&self.program)
            .with_context(|| format!("`{name}` not found in PATH"))?;

        let mut cmd = Command::new(program);
        cmd.args(&self.args)
            .envs(self.envs.iter().cloned())
            .stdin(Stdio::null());

        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        crate::debug!("exec"; "{} {}", name, self.args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" "));

        cmd.output()
            .with_context(|| format!("Failed to execute `{name}`"))
    }
}

/// Collect the non-empty, trimmed lines of a command's stderr then stdout.
pub fn output_lines(output: &Output) -> Vec<String> {
    [&output.stderr, &output.stdout]
        .into_iter()
        .flat_map(|bytes| {
            String::from_utf8_lossy(bytes)
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_splits_program() {
        let cmd = Cmd::from_slice(&["npx", "esbuild", "--bundle"]);
        assert_eq!(cmd.program_name(), "npx");
        assert_eq!(cmd.args.len(), 2);
    }

    #[test]
    fn test_empty_args_dropped() {
        let cmd = Cmd::new("esbuild").args(["", "--minify", ""]);
        assert_eq!(cmd.args, vec![OsString::from("--minify")]);
    }

    #[test]
    fn test_missing_program_is_error() {
        let err = Cmd::new("uspack-no-such-program-xyz").run().unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_empty_command_is_error() {
        let empty: [&str; 0] = [];
        assert!(Cmd::from_slice(&empty).run().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_output_lines() {
        let output = Cmd::from_slice(&["sh", "-c", "echo out; echo '  err  ' 1>&2; echo"])
            .run()
            .unwrap();
        assert!(output.status.success());
        assert_eq!(output_lines(&output), vec!["err", "out"]);
    }
}
