//! Packages awaiting a rebuild.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

/// Package source directories known to be dirty, or the global sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirtySet {
    Packages(FxHashSet<PathBuf>),
    /// Every package is dirty (shared code changed).
    All,
}

impl Default for DirtySet {
    fn default() -> Self {
        Self::Packages(FxHashSet::default())
    }
}

impl DirtySet {
    pub fn of<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::Packages(dirs.into_iter().map(Into::into).collect())
    }

    pub fn mark(&mut self, dir: impl Into<PathBuf>) {
        if let Self::Packages(dirs) = self {
            dirs.insert(dir.into());
        }
    }

    pub fn mark_all(&mut self) {
        *self = Self::All;
    }

    /// Union `other` into `self`. The sentinel absorbs everything.
    pub fn merge(&mut self, other: Self) {
        match other {
            Self::All => self.mark_all(),
            Self::Packages(more) => {
                if let Self::Packages(dirs) = self {
                    dirs.extend(more);
                }
            }
        }
    }

    /// Swap out the current contents, leaving `self` empty.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Packages(dirs) if dirs.is_empty())
    }

    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn contains(&self, dir: &Path) -> bool {
        match self {
            Self::All => true,
            Self::Packages(dirs) => dirs.contains(dir),
        }
    }
}

impl std::fmt::Display for DirtySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("everything"),
            Self::Packages(dirs) => {
                let mut names: Vec<_> = dirs
                    .iter()
                    .map(|d| {
                        d.file_name()
                            .map_or_else(|| d.to_string_lossy(), |n| n.to_string_lossy())
                    })
                    .collect();
                names.sort();
                f.write_str(&names.join(", "))
            }
        }
    }
}
