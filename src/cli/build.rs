//! One-shot commands: `build` and `pack`.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};

use crate::build::Orchestrator;
use crate::compiler::{Bundler, CommandBundler};
use crate::config::AppConfig;
use crate::core::BuildMode;
use crate::log;
use crate::package::{MANIFEST_FILE, Package};
use crate::utils::path::normalize_path;

/// Run one build session and write the aggregate.
///
/// Fails when no aggregate could be produced. Packages that failed to
/// compile are reported but do not fail the command.
pub fn build_packages(config: &AppConfig, force: bool) -> Result<()> {
    log!(
        "build";
        "{} -> {} (minify: {})",
        config.root_relative(&config.build.packages).display(),
        config.root_relative(config.build.output_file()).display(),
        config.build.minify.describe()
    );

    let orchestrator = Orchestrator::from_config(config)?;
    let report = orchestrator.build_all(force)?;

    if orchestrator.current().is_none() {
        bail!("no aggregate was produced");
    }
    if !report.is_clean() {
        let names: Vec<_> = report.failed.iter().map(|f| f.name.as_str()).collect();
        log!("warning"; "left out of the aggregate: {}", names.join(", "));
    }
    Ok(())
}

/// Bundle one package directory and print the result to stdout.
///
/// Nothing else is written to stdout, so the output can be redirected.
pub fn pack_package(config: &AppConfig, dir: &Path, development: bool) -> Result<()> {
    let dir = normalize_path(dir);
    let package = Package::read(&dir)
        .with_context(|| format!("invalid package in `{}`", dir.display()))?
        .ok_or_else(|| anyhow!("no {} in `{}`", MANIFEST_FILE, dir.display()))?;

    let mode = if development {
        BuildMode::Development
    } else {
        config.build.minify.mode_for(package.is_production)
    };

    let bundler = CommandBundler::new(
        config.bundler.clone(),
        config.get_root(),
        config.build.libs.clone(),
    );
    let bundle = bundler
        .bundle(&package.entry(), mode)
        .map_err(|e| anyhow!("failed to bundle {}:\n{}", package.name, e.detail()))?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(bundle.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
