use std::path::PathBuf;

use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

/// Keeps the watched roots attached.
///
/// Roots that do not exist yet, or were removed and recreated, are
/// (re-)attached by [`WatchRoots::maintain`].
pub(super) struct WatchRoots {
    desired: Vec<PathBuf>,
    attached: FxHashSet<PathBuf>,
}

impl WatchRoots {
    pub(super) fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            desired: paths,
            attached: FxHashSet::default(),
        }
    }

    pub(super) fn attach_existing(&mut self, watcher: &mut dyn Watcher) -> notify::Result<()> {
        for path in &self.desired {
            if !path.exists() {
                crate::debug!("watch"; "not watching {} (missing)", path.display());
                continue;
            }
            watcher.watch(path, RecursiveMode::Recursive)?;
            self.attached.insert(path.clone());
        }

        Ok(())
    }

    pub(super) fn maintain(&mut self, watcher: &mut dyn Watcher) {
        self.attached.retain(|path| path.exists());

        for path in &self.desired {
            if self.attached.contains(path) || !path.exists() {
                continue;
            }

            if watcher.watch(path, RecursiveMode::Recursive).is_ok() {
                self.attached.insert(path.clone());
                crate::debug!("watch"; "re-attached watch: {}", path.display());
            }
        }
    }

    pub(super) fn attached(&self) -> usize {
        self.attached.len()
    }
}
