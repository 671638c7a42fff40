//! Filesystem watcher driving incremental rebuilds.
//!
//! ```text
//! notify → EventFilter → DirtyTracker::record      (every event)
//! interval → WatchRoots::maintain → DirtyTracker::tick → Orchestrator::rebuild
//! ```
//!
//! Events only accumulate; the fixed-interval tick is the single place a
//! rebuild starts, so an autosave storm costs one session.

mod filter;
mod tracker;
mod watch_roots;

pub use filter::EventFilter;
pub use tracker::{DirtyTracker, TickOutcome};

use std::path::PathBuf;
use std::sync::{Arc, mpsc as std_mpsc};
use std::time::Duration;

use notify::{PollWatcher, RecommendedWatcher, Watcher};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::build::Orchestrator;
use crate::config::AppConfig;
use crate::core::is_shutdown;
use crate::{debug, log};
use watch_roots::WatchRoots;

const EVENT_BUFFER: usize = 256;

/// Watcher settings derived from the config.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    /// Package root and shared-library directories.
    pub roots: Vec<PathBuf>,
    pub ignore: Vec<String>,
    /// Build output, never a source of changes.
    pub excluded: Vec<PathBuf>,
    pub interval: Duration,
    pub poll: bool,
}

impl WatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let mut roots = vec![config.build.packages.clone()];
        roots.extend(config.build.libs.iter().cloned());
        Self {
            roots,
            ignore: config.build.ignore.clone(),
            excluded: vec![config.build.output.clone()],
            interval: config.watch.interval(),
            poll: config.watch.poll,
        }
    }
}

/// Watches the source roots and ticks the dirty tracker.
pub struct WatchActor {
    /// notify callback → this receiver (sync side)
    notify_rx: std_mpsc::Receiver<notify::Result<notify::Event>>,
    watcher: Box<dyn Watcher + Send>,
    roots: WatchRoots,
    filter: EventFilter,
    tracker: Arc<DirtyTracker>,
    interval: Duration,
}

impl WatchActor {
    /// Start watching immediately; events buffer until [`WatchActor::run`].
    pub fn new(settings: WatchSettings, orchestrator: Arc<Orchestrator>) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std_mpsc::channel();
        let handler = move |res: notify::Result<notify::Event>| {
            let _ = notify_tx.send(res);
        };

        let mut watcher: Box<dyn Watcher + Send> = if settings.poll {
            let config = notify::Config::default().with_poll_interval(settings.interval);
            Box::new(PollWatcher::new(handler, config)?)
        } else {
            Box::new(RecommendedWatcher::new(handler, notify::Config::default())?)
        };

        let mut roots = WatchRoots::new(settings.roots);
        roots.attach_existing(watcher.as_mut())?;
        debug!("watch"; "{} roots attached", roots.attached());

        Ok(Self {
            notify_rx,
            watcher,
            roots,
            filter: EventFilter::new(settings.ignore, settings.excluded),
            tracker: Arc::new(DirtyTracker::new(orchestrator)),
            interval: settings.interval,
        })
    }

    /// Event loop; returns once shutdown is requested.
    pub async fn run(self) {
        let Self {
            notify_rx,
            mut watcher,
            mut roots,
            filter,
            tracker,
            interval,
        } = self;

        let (event_tx, mut event_rx) = mpsc::channel::<notify::Event>(EVENT_BUFFER);

        // notify delivers on a sync channel; bridge it into the runtime
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if event_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        log!("watch"; "rebuilding changed packages every {}ms", interval.as_millis());

        loop {
            tokio::select! {
                biased;
                Some(event) = event_rx.recv() => {
                    if !EventFilter::is_relevant_kind(&event.kind) {
                        continue;
                    }
                    for path in event.paths.iter().filter(|p| filter.accepts(p)) {
                        tracker.record(path);
                    }
                }
                _ = ticker.tick() => {
                    if is_shutdown() {
                        break;
                    }
                    roots.maintain(watcher.as_mut());

                    let tracker = Arc::clone(&tracker);
                    match tokio::task::spawn_blocking(move || tracker.tick()).await {
                        Ok(outcome) => debug!("watch"; "tick: {:?}", outcome),
                        Err(e) => log!("watch"; "rebuild task failed: {}", e),
                    }
                }
            }
        }

        debug!("watch"; "stopped");
    }
}
