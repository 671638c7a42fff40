//! Server lifecycle management.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tiny_http::Server;

use crate::build::Orchestrator;
use crate::config::AppConfig;
use crate::log;
use crate::watch::{WatchActor, WatchSettings};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Bind to the specified interface and port, with automatic port retry.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string())
    ))
}

/// Start the watcher on its own runtime thread.
///
/// The watcher is attached before this returns, so changes made during the
/// initial build are not missed.
pub fn spawn_watcher(
    config: &AppConfig,
    orchestrator: Arc<Orchestrator>,
) -> Result<Option<JoinHandle<()>>> {
    if !config.serve.watch {
        return Ok(None);
    }

    let actor = WatchActor::new(WatchSettings::from_config(config), orchestrator)
        .map_err(|e| anyhow!("watcher failed: {}", e))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    Ok(Some(thread::spawn(move || runtime.block_on(actor.run()))))
}

/// Wait for the watcher to stop (max 2 seconds).
pub fn wait_for_shutdown(handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else { return };

    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}
