//! Userscript server.
//!
//! | Route | Response |
//! |-------|----------|
//! | `/us.js` | the aggregate |
//! | `/full.user.js`, `/full.js` | loader header + aggregate |
//! | `/lite.user.js` | loader header fetching `/us.js` |
//! | `/` | index page |
//! | `POST /rebuild` | forced full rebuild, JSON report |

mod lifecycle;
mod response;

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use serde_json::json;
use tiny_http::{Method, Request, Server};

use crate::build::{BuildError, BuildEvent, DirtySet, Orchestrator};
use crate::config::{AppConfig, cfg};
use crate::core::{is_shutdown, register_server};
use crate::embed::serve::{BootstrapVars, IndexVars};
use crate::utils::date::DateTimeUtc;
use crate::{debug, log};
use response::Script;

/// Request handler threads.
const WORKERS: usize = 4;

/// Bound server ready to accept requests
pub struct BoundServer {
    server: Arc<Server>,
    addr: SocketAddr,
}

/// Bind the HTTP server without starting the request loop.
pub fn bind_server(config: &AppConfig) -> Result<BoundServer> {
    let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);
    register_server(Arc::clone(&server));

    log!("serve"; "http://{}", addr);
    Ok(BoundServer { server, addr })
}

/// Shared by every request handler.
struct ServeContext {
    orchestrator: Arc<Orchestrator>,
    /// Bound port, written into the loader's `@require`.
    port: u16,
}

impl BoundServer {
    /// Start the watcher and an initial build, then serve until shutdown.
    pub fn run(self, config: &AppConfig, orchestrator: Arc<Orchestrator>) -> Result<()> {
        let watcher = lifecycle::spawn_watcher(config, Arc::clone(&orchestrator))?;

        let events = orchestrator.subscribe();
        thread::spawn(move || {
            for event in events {
                match event {
                    BuildEvent::Success(aggregate) => {
                        log!("serve"; "serving new bundle ({} bytes)", aggregate.content.len());
                    }
                    BuildEvent::Failed(reason) => log!("serve"; "bundle not updated: {}", reason),
                }
            }
        });

        {
            let orchestrator = Arc::clone(&orchestrator);
            thread::spawn(move || {
                if orchestrator.current_or_build().is_none() {
                    log!("serve"; "no bundle yet, fix the errors above and save to retry");
                }
            });
        }

        let context = Arc::new(ServeContext {
            orchestrator,
            port: self.addr.port(),
        });
        log!(
            "serve";
            "install http://{}:{}/lite.user.js in your userscript manager",
            config.serve.advertised_host(),
            context.port
        );

        run_request_loop(&self.server, &context)?;
        lifecycle::wait_for_shutdown(watcher);
        Ok(())
    }
}

fn run_request_loop(server: &Server, context: &Arc<ServeContext>) -> Result<()> {
    // a cold-start request blocks its worker until the build finishes
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(WORKERS)
        .build()
        .context("failed to create request thread pool")?;

    for request in server.incoming_requests() {
        let context = Arc::clone(context);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &context) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(request: Request, context: &ServeContext) -> Result<()> {
    if is_shutdown() {
        return response::respond_unavailable(request);
    }

    let path = request.url().split(['?', '#']).next().unwrap_or("/").to_string();
    let method = request.method().clone();
    debug!("serve"; "{} {}", method, path);

    let script = match path.as_str() {
        "/us.js" => Some(Script::Bundle),
        "/full.user.js" | "/full.js" => Some(Script::Full),
        "/lite.user.js" => Some(Script::Lite),
        _ => None,
    };

    match (method, script) {
        (Method::Get | Method::Head, Some(script)) => {
            let aggregate = context.orchestrator.current_or_build();
            let loader = BootstrapVars {
                hostname: cfg().serve.advertised_host(),
                port: context.port,
            };
            response::respond_script(request, script, aggregate.as_deref(), &loader)
        }
        (_, Some(_)) => response::respond_method_not_allowed(request),
        (Method::Get | Method::Head, None) if path == "/" => {
            response::respond_index(request, &index_vars(&context.orchestrator))
        }
        (Method::Post, None) if path == "/rebuild" => respond_rebuild(request, context),
        (_, None) if path == "/rebuild" || path == "/" => {
            response::respond_method_not_allowed(request)
        }
        _ => response::respond_not_found(request),
    }
}

/// Force a full rebuild and report it.
fn respond_rebuild(request: Request, context: &ServeContext) -> Result<()> {
    log!("serve"; "rebuild requested");
    match context.orchestrator.rebuild(&DirtySet::All, true) {
        Ok(report) => response::respond_json(request, 200, &report),
        Err(e @ BuildError::Busy { .. }) => {
            response::respond_json(request, 409, &json!({ "error": e.to_string() }))
        }
        Err(e) => response::respond_json(request, 500, &json!({ "error": e.to_string() })),
    }
}

fn index_vars(orchestrator: &Orchestrator) -> IndexVars {
    let status = match orchestrator.current() {
        _ if orchestrator.is_building() => "building...".to_string(),
        Some(aggregate) => format!(
            "bundle built {} ({} bytes)",
            DateTimeUtc::from_system_time(aggregate.generated_at).to_display(),
            aggregate.content.len()
        ),
        None => "no bundle yet, see the server log".to_string(),
    };
    let packages = orchestrator
        .registry()
        .iter()
        .map(|p| (p.name.clone(), p.matches.clone()))
        .collect();
    IndexVars { status, packages }
}
