//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::MinifyPolicy;

/// uspack: incremental builder and live server for userscript packages
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: uspack.toml)
    #[arg(short = 'C', long, default_value = "uspack.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build every package and write the aggregate
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Ignore cached artifacts and recompile every package
        #[arg(short, long)]
        force: bool,
    },

    /// Serve the aggregate and rebuild on file changes
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable file watching for auto-rebuild
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,

        /// Use a polling watcher instead of native file events
        #[arg(long)]
        poll: bool,

        /// Milliseconds between rebuild ticks
        #[arg(long, value_name = "MS")]
        interval: Option<u64>,
    },

    /// Bundle a single package directory to stdout
    #[command(visible_alias = "p")]
    Pack {
        /// Package directory containing package.json
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,

        /// Bundle in development mode regardless of the manifest
        #[arg(short, long)]
        development: bool,
    },

    /// List the packages whose match patterns accept a URL
    #[command(visible_alias = "w")]
    Which {
        /// Page URL to test
        url: String,
    },
}

/// Shared build arguments for Build and Serve commands
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Package root directory (relative to project root)
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub packages: Option<PathBuf>,

    /// Build root directory (relative to project root)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Minify policy override
    #[arg(short, long, value_enum)]
    pub minify: Option<MinifyPolicy>,
}
