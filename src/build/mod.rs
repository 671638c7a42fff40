//! Build orchestration.
//!
//! One session:
//!
//! 1. open the session gate (a second caller gets [`BuildError::Busy`])
//! 2. rediscover packages
//! 3. fingerprint every package and load its cache entry
//! 4. compile the dirty, forced or uncached packages, in registry order
//! 5. assemble all current artifacts into the aggregate
//! 6. publish it to the [`AggregateCache`] and notify subscribers
//!
//! A package that fails to compile is left out of the aggregate; its
//! previous cache entry stays on disk. A failed assembly publishes nothing.

mod aggregate;
mod dirty;
mod report;
mod session;
#[cfg(test)]
mod tests;

pub use aggregate::{AggregateArtifact, AggregateCache};
pub use dirty::DirtySet;
pub use report::{BuildReport, FailedPackage};
pub use session::SessionGate;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use crossbeam::channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use thiserror::Error;

use crate::assemble::{AssemblyError, assemble};
use crate::cache::{BuildArtifact, BuildCache, is_valid};
use crate::compiler::{BundleError, Bundler, CommandBundler};
use crate::config::AppConfig;
use crate::core::{BuildMode, MinifyPolicy};
use crate::freshness::{ContentHash, fingerprint_dir, hash_bytes};
use crate::package::{Package, PackageRegistry, RegistryError};
use crate::utils::{date::DateTimeUtc, fs::write_atomic};
use crate::{debug, log};

/// Session-level failures.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("already building (started {})", display_time(.started_at))]
    Busy { started_at: SystemTime },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

fn display_time(time: &SystemTime) -> String {
    DateTimeUtc::from_system_time(*time).to_display()
}

/// Broadcast after every session that reaches assembly.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    Success(Arc<AggregateArtifact>),
    Failed(String),
}

/// Inputs that stay fixed for the orchestrator's lifetime.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Directory whose sub-directories are packages.
    pub packages: PathBuf,
    /// Directory names left out of fingerprints.
    pub ignore: Vec<String>,
    /// Entrypoint template source.
    pub template: String,
    pub minify: MinifyPolicy,
    /// Where the aggregate is also written; `None` keeps it in memory only.
    pub output_file: Option<PathBuf>,
}

impl BuildSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let template = match &config.build.template {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("failed to read template `{}`", path.display()))?,
            None => crate::embed::build::ENTRYPOINT_JS.to_string(),
        };

        Ok(Self {
            packages: config.build.packages.clone(),
            ignore: config.build.ignore.clone(),
            template,
            minify: config.build.minify,
            output_file: Some(config.build.output_file()),
        })
    }

    /// Package names that would put a cache directory on the output file.
    pub fn reserved_names(&self) -> Vec<String> {
        self.output_file
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .into_iter()
            .collect()
    }
}

/// Owns the session gate, the aggregate and the last registry snapshot.
///
/// Shared between the HTTP workers and the watcher; every method takes
/// `&self`.
pub struct Orchestrator {
    settings: BuildSettings,
    cache: BuildCache,
    bundler: Arc<dyn Bundler>,
    gate: SessionGate,
    aggregate: AggregateCache,
    registry: ArcSwap<PackageRegistry>,
    /// Assembly input of the published aggregate.
    published_key: Mutex<Option<ContentHash>>,
    subscribers: Mutex<Vec<Sender<BuildEvent>>>,
}

impl Orchestrator {
    pub fn new(settings: BuildSettings, cache: BuildCache, bundler: Arc<dyn Bundler>) -> Self {
        Self {
            settings,
            cache,
            bundler,
            gate: SessionGate::default(),
            aggregate: AggregateCache::default(),
            registry: ArcSwap::from_pointee(PackageRegistry::default()),
            published_key: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Orchestrator driving the configured external bundler.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let bundler = CommandBundler::new(
            config.bundler.clone(),
            config.get_root(),
            config.build.libs.clone(),
        );
        Ok(Self::new(
            BuildSettings::from_config(config)?,
            BuildCache::new(&config.build.output),
            Arc::new(bundler),
        ))
    }

    /// Bring every package up to date, compiling only what changed.
    /// With `force`, every package is recompiled.
    pub fn build_all(&self, force: bool) -> Result<BuildReport, BuildError> {
        self.rebuild(&DirtySet::default(), force)
    }

    /// Run one build session.
    pub fn rebuild(&self, dirty: &DirtySet, force_all: bool) -> Result<BuildReport, BuildError> {
        let session = self.gate.try_open().map_err(|started_at| {
            log!("build"; "already building (started {}), request dropped", display_time(&started_at));
            BuildError::Busy { started_at }
        })?;
        let started = Instant::now();
        debug!(
            "build";
            "session opened at {}, dirty: {}",
            display_time(&session.started_at()),
            dirty
        );

        let registry = match PackageRegistry::discover_reserving(
            &self.settings.packages,
            &self.settings.reserved_names(),
        ) {
            Ok(registry) => Arc::new(registry),
            Err(e) => {
                log!("registry"; "{}", e);
                self.emit(BuildEvent::Failed(e.to_string()));
                return Err(e.into());
            }
        };
        self.registry.store(Arc::clone(&registry));

        let rebuild_all = force_all || dirty.is_all();
        let mut report = BuildReport::default();
        let mut artifacts = Vec::with_capacity(registry.len());

        for package in registry.iter() {
            let live = self.fingerprint(package);
            let cached = self
                .load_cached(package)
                .filter(|entry| live.as_ref().is_some_and(|live| is_valid(entry, live)));

            let reason = if rebuild_all {
                Some("forced")
            } else if dirty.contains(&package.dir) {
                Some("dirty")
            } else if cached.is_none() {
                Some("not cached")
            } else {
                None
            };

            match (reason, cached) {
                (None, Some(entry)) => {
                    debug!("cache"; "{} is up to date", package.name);
                    report.reused.push(package.name.clone());
                    artifacts.push(entry);
                }
                (reason, _) => {
                    debug!("build"; "building {} ({})", package.name, reason.unwrap_or("stale"));
                    match self.compile(package, live) {
                        Ok(artifact) => {
                            report.compiled.push(package.name.clone());
                            artifacts.push(artifact);
                        }
                        Err(e) => {
                            log!("compile"; "{} failed: {}", package.name, e);
                            for diagnostic in e.diagnostics.iter().skip(1) {
                                log!("compile"; "  {}", diagnostic);
                            }
                            report.failed.push(FailedPackage {
                                name: package.name.clone(),
                                diagnostics: e.diagnostics.iter().map(ToString::to_string).collect(),
                            });
                        }
                    }
                }
            }
        }

        let published = self.assemble_and_publish(&artifacts, rebuild_all)?;
        report.published = published.is_some();
        report.bytes = self.aggregate.load().map_or(0, |a| a.content.len());
        report.elapsed = started.elapsed();

        log!("build"; "{}", report.summary());
        drop(session);

        if let Some(artifact) = published {
            self.emit(BuildEvent::Success(artifact));
        }
        Ok(report)
    }

    /// Latest aggregate, if any session has succeeded.
    pub fn current(&self) -> Option<Arc<AggregateArtifact>> {
        self.aggregate.load()
    }

    /// Latest aggregate, building it first on a cold start.
    ///
    /// Concurrent callers that find a session in flight wait for it and all
    /// receive its result. `None` when no aggregate could be produced.
    pub fn current_or_build(&self) -> Option<Arc<AggregateArtifact>> {
        if let Some(current) = self.aggregate.load() {
            return Some(current);
        }

        match self.build_all(false) {
            Ok(_) => {}
            Err(BuildError::Busy { .. }) => self.gate.wait_idle(),
            Err(e) => debug!("serve"; "cold-start build failed: {}", e),
        }
        self.aggregate.load()
    }

    pub fn is_building(&self) -> bool {
        self.gate.is_active()
    }

    /// Package snapshot taken by the latest session.
    pub fn registry(&self) -> Arc<PackageRegistry> {
        self.registry.load_full()
    }

    /// Receive a [`BuildEvent`] after each session.
    pub fn subscribe(&self) -> Receiver<BuildEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    // ========================================================================
    // per-package steps
    // ========================================================================

    /// Live fingerprint; `None` forces a rebuild.
    fn fingerprint(&self, package: &Package) -> Option<ContentHash> {
        match fingerprint_dir(&package.dir, &self.settings.ignore) {
            Ok(hash) => {
                debug!("hash"; "{} -> {}", package.name, hash);
                Some(hash)
            }
            Err(e) => {
                log!("hash"; "cannot fingerprint {}: {}, rebuilding", package.name, e);
                None
            }
        }
    }

    /// Stored entry; read failures count as a miss.
    fn load_cached(&self, package: &Package) -> Option<BuildArtifact> {
        self.cache.load(&package.name).unwrap_or_else(|e| {
            log!("cache"; "ignoring entry for {}: {}", package.name, e);
            None
        })
    }

    fn compile(
        &self,
        package: &Package,
        live: Option<ContentHash>,
    ) -> Result<BuildArtifact, BundleError> {
        let mode = self.settings.minify.mode_for(package.is_production);
        log!("compile"; "{} ({})", package.name, mode);

        let content = self.bundler.bundle(&package.entry(), mode)?;
        let artifact = BuildArtifact {
            name: package.name.clone(),
            fingerprint: live.unwrap_or_else(|| hash_bytes(content.as_bytes())),
            matches: package.matches.clone(),
            content,
        };

        // Without a real fingerprint the entry could never validate.
        if live.is_some() {
            if let Err(e) = self.cache.store(&artifact) {
                log!("cache"; "failed to store {}: {}", package.name, e);
            }
        } else {
            debug!("cache"; "not caching {} (no fingerprint)", package.name);
        }

        Ok(artifact)
    }

    // ========================================================================
    // aggregate
    // ========================================================================

    /// Returns the newly published aggregate, or `None` when the inputs
    /// match the aggregate already published.
    ///
    /// `rebuild_all` always reassembles: shared code outside the package
    /// fingerprints may have changed.
    fn assemble_and_publish(
        &self,
        artifacts: &[BuildArtifact],
        rebuild_all: bool,
    ) -> Result<Option<Arc<AggregateArtifact>>, BuildError> {
        let mode = self.settings.minify.aggregate_mode();
        let key = self.assembly_key(artifacts, mode);

        if !rebuild_all && !self.aggregate.is_empty() && *self.published_key.lock() == Some(key) {
            debug!("assemble"; "inputs unchanged, keeping current aggregate");
            return Ok(None);
        }

        let now = SystemTime::now();
        let stamp = DateTimeUtc::from_system_time(now).to_display();
        log!("assemble"; "{} packages ({})", artifacts.len(), mode);

        let content = assemble(
            self.bundler.as_ref(),
            &self.settings.template,
            artifacts,
            &stamp,
            mode,
        )
        .map_err(|e| {
            log!("assemble"; "{}", e);
            if let AssemblyError::Bundle(bundle) = &e {
                for diagnostic in bundle.diagnostics.iter().skip(1) {
                    log!("assemble"; "  {}", diagnostic);
                }
            }
            self.emit(BuildEvent::Failed(e.to_string()));
            e
        })?;

        if let Some(path) = &self.settings.output_file {
            match write_atomic(path, content.as_bytes()) {
                Ok(()) => debug!("build"; "wrote {}", path.display()),
                Err(e) => log!("build"; "failed to write {}: {}", path.display(), e),
            }
        }

        let artifact = self.aggregate.publish(AggregateArtifact {
            content: content.into(),
            generated_at: now,
        });
        *self.published_key.lock() = Some(key);
        Ok(Some(artifact))
    }

    /// Digest of everything that feeds the aggregate.
    fn assembly_key(&self, artifacts: &[BuildArtifact], mode: BuildMode) -> ContentHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(mode.as_str().as_bytes());
        hasher.update(hash_bytes(self.settings.template.as_bytes()).as_bytes());
        for artifact in artifacts {
            hasher.update(artifact.name.as_bytes());
            hasher.update(&[0]);
            hasher.update(hash_bytes(artifact.content.as_bytes()).as_bytes());
            for pattern in &artifact.matches {
                hasher.update(pattern.as_bytes());
                hasher.update(&[0]);
            }
            hasher.update(&[1]);
        }
        ContentHash::new(*hasher.finalize().as_bytes())
    }

    fn emit(&self, event: BuildEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
