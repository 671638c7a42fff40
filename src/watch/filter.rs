//! Event noise filtering.
//!
//! Editors and package managers produce events that never change a bundle:
//! swap files, backups, dotfiles, metadata touches, dependency installs.

use std::path::{Path, PathBuf};

use notify::EventKind;
use notify::event::ModifyKind;

/// Decides which event paths reach the dirty tracker.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Directory names skipped anywhere in a path (e.g. `node_modules`).
    ignored_names: Vec<String>,
    /// Trees never watched for changes (the build output).
    excluded: Vec<PathBuf>,
}

impl EventFilter {
    pub fn new(ignored_names: Vec<String>, excluded: Vec<PathBuf>) -> Self {
        Self {
            ignored_names,
            excluded,
        }
    }

    /// Whether the event kind can change file contents.
    pub fn is_relevant_kind(kind: &EventKind) -> bool {
        match kind {
            EventKind::Create(_) | EventKind::Remove(_) => true,
            // mtime/chmod noise would otherwise loop rebuilds
            EventKind::Modify(ModifyKind::Metadata(_)) => false,
            EventKind::Modify(_) => true,
            _ => false,
        }
    }

    pub fn accepts(&self, path: &Path) -> bool {
        if is_temp_file(path) {
            return false;
        }
        if self.excluded.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }
        !path.components().any(|c| {
            let name = c.as_os_str().to_string_lossy();
            self.ignored_names.iter().any(|ignored| *ignored == name)
        })
    }
}

/// Temp/backup files written by editors.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
        || name.starts_with('#')
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind};

    fn filter() -> EventFilter {
        EventFilter::new(vec!["node_modules".into()], vec![PathBuf::from("/proj/build")])
    }

    #[test]
    fn test_editor_noise_rejected() {
        let f = filter();
        assert!(!f.accepts(Path::new("/proj/src/alpha/.index.js.swp")));
        assert!(!f.accepts(Path::new("/proj/src/alpha/index.js~")));
        assert!(!f.accepts(Path::new("/proj/src/alpha/index.js.bak")));
        assert!(!f.accepts(Path::new("/proj/src/alpha/#index.js#")));
        assert!(f.accepts(Path::new("/proj/src/alpha/index.js")));
    }

    #[test]
    fn test_ignored_and_excluded_trees() {
        let f = filter();
        assert!(!f.accepts(Path::new("/proj/src/alpha/node_modules/x/index.js")));
        assert!(!f.accepts(Path::new("/proj/build/alpha/bundle.js")));
        assert!(f.accepts(Path::new("/proj/src/node_modules_notes.js")));
    }

    #[test]
    fn test_metadata_only_changes_ignored() {
        assert!(!EventFilter::is_relevant_kind(&EventKind::Modify(
            ModifyKind::Metadata(MetadataKind::WriteTime)
        )));
        assert!(EventFilter::is_relevant_kind(&EventKind::Modify(
            ModifyKind::Data(DataChange::Content)
        )));
        assert!(EventFilter::is_relevant_kind(&EventKind::Create(CreateKind::File)));
        assert!(!EventFilter::is_relevant_kind(&EventKind::Access(
            notify::event::AccessKind::Any
        )));
    }
}
