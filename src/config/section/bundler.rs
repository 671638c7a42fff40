//! `[bundler]` section configuration.
//!
//! The bundler is an external program. Arguments may reference:
//!
//! | Variable          | Value                                         |
//! |-------------------|-----------------------------------------------|
//! | `$USPACK_ENTRY`   | absolute path of the entry file               |
//! | `$USPACK_OUTPUT`  | file the bundler must write the bundle to     |
//! | `$USPACK_MODE`    | `production` or `development`                 |
//! | `$USPACK_ROOT`    | project root                                  |
//! | `$USPACK_LIBS`    | shared-library dirs joined with the path separator |
//!
//! # Example
//!
//! ```toml
//! [bundler]
//! command = ["npx", "esbuild", "$USPACK_ENTRY", "--bundle", "--outfile=$USPACK_OUTPUT"]
//! production_args = ["--minify"]
//! development_args = []
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlerConfig {
    /// Program followed by its arguments.
    pub command: Vec<String>,

    /// Appended in production mode.
    pub production_args: Vec<String>,

    /// Appended in development mode.
    pub development_args: Vec<String>,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            command: [
                "npx",
                "esbuild",
                "$USPACK_ENTRY",
                "--bundle",
                "--format=iife",
                "--platform=browser",
                "--outfile=$USPACK_OUTPUT",
                "--log-level=warning",
            ]
            .map(String::from)
            .to_vec(),
            production_args: vec!["--minify".into()],
            development_args: vec!["--sourcemap=inline".into()],
        }
    }
}
