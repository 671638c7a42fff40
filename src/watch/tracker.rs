//! Change events to dirty packages, and the periodic drain.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::build::{BuildError, BuildReport, DirtySet, Orchestrator};
use crate::package::PackageRegistry;
use crate::utils::path::normalize_path;
use crate::{debug, log, logger};

/// What one tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// Nothing was dirty.
    Idle,
    Built(BuildReport),
    /// A session was already running; the dirty set was kept for the next tick.
    Deferred,
    Failed(String),
}

/// Accumulates dirty packages between ticks.
pub struct DirtyTracker {
    orchestrator: Arc<Orchestrator>,
    dirty: Mutex<DirtySet>,
    owners: Mutex<Owners>,
}

/// Package directories of one registry snapshot, normalized for prefix lookups.
#[derive(Default)]
struct Owners {
    snapshot: Option<Arc<PackageRegistry>>,
    /// (normalized dir, dir as the orchestrator knows it)
    dirs: Vec<(PathBuf, PathBuf)>,
}

impl DirtyTracker {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            dirty: Mutex::new(DirtySet::default()),
            owners: Mutex::new(Owners::default()),
        }
    }

    /// Mark the package owning `path` dirty.
    ///
    /// A path no package owns (shared library, new package directory) marks
    /// everything dirty.
    pub fn record(&self, path: &Path) {
        let path = normalize_path(path);
        match self.owner_of(&path) {
            Some(dir) => {
                debug!("watch"; "{} -> {}", path.display(), dir.display());
                self.dirty.lock().mark(dir);
            }
            None => {
                debug!("watch"; "{} has no owning package, rebuilding all", path.display());
                self.dirty.lock().mark_all();
            }
        }
    }

    /// Take the accumulated set, leaving it empty.
    pub fn drain(&self) -> DirtySet {
        self.dirty.lock().take()
    }

    /// Put back a set that could not be built.
    pub fn restore(&self, dirty: DirtySet) {
        self.dirty.lock().merge(dirty);
    }

    /// Drain and rebuild once if anything was dirty.
    pub fn tick(&self) -> TickOutcome {
        let dirty = self.drain();
        if dirty.is_empty() {
            return TickOutcome::Idle;
        }
        log!("watch"; "changed: {}", dirty);

        match self.orchestrator.rebuild(&dirty, false) {
            Ok(report) => {
                if !report.is_clean() {
                    let detail = report
                        .failed
                        .iter()
                        .map(|f| format!("{}: {}", f.name, f.diagnostics.join("\n  ")))
                        .collect::<Vec<_>>()
                        .join("\n");
                    logger::status_error(&report.summary(), &detail);
                } else if report.published {
                    logger::status_success(&report.summary());
                } else {
                    logger::status_unchanged("aggregate unchanged");
                }
                TickOutcome::Built(report)
            }
            Err(BuildError::Busy { .. }) => {
                self.restore(dirty);
                TickOutcome::Deferred
            }
            Err(e) => {
                logger::status_error("build failed", &e.to_string());
                TickOutcome::Failed(e.to_string())
            }
        }
    }

    /// Longest-prefix owner among the latest registry's directories.
    fn owner_of(&self, path: &Path) -> Option<PathBuf> {
        let registry = self.orchestrator.registry();
        let mut owners = self.owners.lock();
        if !owners
            .snapshot
            .as_ref()
            .is_some_and(|s| Arc::ptr_eq(s, &registry))
        {
            owners.dirs = registry
                .dirs()
                .into_iter()
                .map(|dir| (normalize_path(&dir), dir))
                .collect();
            owners.snapshot = Some(registry);
        }

        owners
            .dirs
            .iter()
            .filter(|(normalized, _)| path.starts_with(normalized))
            .max_by_key(|(normalized, _)| normalized.components().count())
            .map(|(_, dir)| dir.clone())
    }
}
