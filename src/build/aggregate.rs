//! Latest published aggregate.

use std::sync::Arc;
use std::time::SystemTime;

use arc_swap::ArcSwapOption;

/// The single deliverable served to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateArtifact {
    pub content: Arc<str>,
    pub generated_at: SystemTime,
}

/// Lock-free holder, replaced wholesale on every successful session.
#[derive(Debug, Default)]
pub struct AggregateCache {
    current: ArcSwapOption<AggregateArtifact>,
}

impl AggregateCache {
    pub fn load(&self) -> Option<Arc<AggregateArtifact>> {
        self.current.load_full()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_none()
    }

    pub fn publish(&self, artifact: AggregateArtifact) -> Arc<AggregateArtifact> {
        let artifact = Arc::new(artifact);
        self.current.store(Some(Arc::clone(&artifact)));
        artifact
    }
}
