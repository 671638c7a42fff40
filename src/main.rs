//! uspack - incremental builder and live server for userscript packages.

mod assemble;
mod build;
mod cache;
mod cli;
mod compiler;
mod config;
mod core;
mod embed;
mod freshness;
mod logger;
mod package;
mod utils;
mod watch;

use std::sync::Arc;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::{AppConfig, init_config};

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = init_config(AppConfig::load(&cli)?);

    match &cli.command {
        Commands::Build { force, .. } => cli::build::build_packages(&config, *force),
        Commands::Serve { .. } => serve(&config),
        Commands::Pack { dir, development } => cli::build::pack_package(&config, dir, *development),
        Commands::Which { url } => cli::query::which_packages(&config, url),
    }
}

/// Bind first so early requests wait on the initial build instead of failing.
fn serve(config: &AppConfig) -> Result<()> {
    let orchestrator = Arc::new(build::Orchestrator::from_config(config)?);
    let server = cli::serve::bind_server(config)?;
    server.run(config, orchestrator)
}
