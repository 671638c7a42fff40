//! Global config handle.
//!
//! Uses `arc-swap` for lock-free reads from the server pool, the watcher
//! thread and the orchestrator.

use crate::config::AppConfig;
use arc_swap::ArcSwap;
use std::sync::{Arc, LazyLock};

/// Global config storage.
pub static CONFIG: LazyLock<ArcSwap<AppConfig>> =
    LazyLock::new(|| ArcSwap::from_pointee(AppConfig::default()));

#[inline]
pub fn cfg() -> Arc<AppConfig> {
    CONFIG.load_full()
}

#[inline]
pub fn init_config(config: AppConfig) -> Arc<AppConfig> {
    let arc = Arc::new(config);
    CONFIG.store(Arc::clone(&arc));
    arc
}
