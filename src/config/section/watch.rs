//! `[watch]` section configuration.
//!
//! ```toml
//! [watch]
//! interval_ms = 5000   # dirty-set drain period
//! poll = false         # poll instead of native fs events (network shares)
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Milliseconds between dirty-set drains.
    pub interval_ms: u64,

    /// Use a polling watcher.
    pub poll: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            poll: false,
        }
    }
}

impl WatchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
