//! HTTP response handlers.

use std::sync::LazyLock;
use std::time::SystemTime;

use anyhow::{Result, anyhow};
use regex::Regex;
use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::build::AggregateArtifact;
use crate::embed::serve::{BOOTSTRAP_USER_JS, BootstrapVars, INDEX_HTML, IndexVars};
use crate::utils::date::DateTimeUtc;

const JAVASCRIPT: &str = "application/javascript; charset=utf-8";
const HTML: &str = "text/html; charset=utf-8";
const JSON: &str = "application/json";
const PLAIN: &str = "text/plain; charset=utf-8";

const NO_BUNDLE_JS: &str = "// uspack: no bundle is available yet, see the server log\n";

/// The loader's `@require .../us.js` line.
static REQUIRE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^// @require .*?/us\.js$").unwrap());

/// Which script variant to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// `/us.js`: the aggregate alone.
    Bundle,
    /// `/full.user.js`: loader header with the aggregate inlined.
    Full,
    /// `/lite.user.js`: loader header that fetches `/us.js`.
    Lite,
}

/// Status, headers and body for a script request, before any I/O.
#[derive(Debug, PartialEq, Eq)]
pub struct ScriptReply {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl ScriptReply {
    /// Decide the reply from the current aggregate and the request's
    /// `If-Modified-Since` value.
    pub fn new(
        script: Script,
        aggregate: Option<&AggregateArtifact>,
        if_modified_since: Option<&str>,
        loader: &BootstrapVars,
    ) -> Self {
        let Some(aggregate) = aggregate else {
            return Self {
                status: if script == Script::Bundle { 400 } else { 404 },
                headers: Vec::new(),
                body: NO_BUNDLE_JS.into(),
            };
        };

        let stamp = DateTimeUtc::from_system_time(aggregate.generated_at);
        let headers = vec![
            ("Last-Modified", stamp.to_rfc2822()),
            ("X-Created-Date", stamp.to_rfc3339()),
        ];

        if not_modified_since(if_modified_since, aggregate.generated_at) {
            return Self {
                status: 304,
                headers,
                body: Vec::new(),
            };
        }

        let body = match script {
            Script::Bundle => aggregate.content.to_string(),
            Script::Full => full_user_js(&BOOTSTRAP_USER_JS.render(loader), &aggregate.content),
            Script::Lite => BOOTSTRAP_USER_JS.render(loader),
        };
        Self {
            status: 200,
            headers,
            body: body.into_bytes(),
        }
    }
}

/// Respond with a script built from the current aggregate.
pub fn respond_script(
    request: Request,
    script: Script,
    aggregate: Option<&AggregateArtifact>,
    loader: &BootstrapVars,
) -> Result<()> {
    let since = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("If-Modified-Since"))
        .map(|h| h.value.as_str().to_owned());
    let reply = ScriptReply::new(script, aggregate, since.as_deref(), loader);

    let extra: Vec<_> = reply
        .headers
        .iter()
        .map(|(key, value)| (*key, value.as_str()))
        .collect();
    send(request, reply.status, JAVASCRIPT, reply.body, &extra)
}

/// Loader header with its remote `@require` disabled, then the bundle.
pub fn full_user_js(header: &str, bundle: &str) -> String {
    let header = REQUIRE_LINE.replace_all(header, "// $0");
    format!("{header}\n{bundle}")
}

pub fn respond_index(request: Request, vars: &IndexVars) -> Result<()> {
    send(request, 200, HTML, INDEX_HTML.render(vars).into_bytes(), &[])
}

pub fn respond_json<T: Serialize>(request: Request, status: u16, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value)?;
    send(request, status, JSON, body, &[])
}

pub fn respond_not_found(request: Request) -> Result<()> {
    send(request, 404, PLAIN, b"404 Not Found".to_vec(), &[])
}

pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    send(request, 405, PLAIN, b"405 Method Not Allowed".to_vec(), &[])
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send(request, 503, PLAIN, b"503 Service Unavailable".to_vec(), &[])
}

/// `If-Modified-Since` covers `generated_at` (second precision).
fn not_modified_since(since: Option<&str>, generated_at: SystemTime) -> bool {
    since
        .and_then(DateTimeUtc::parse_rfc2822)
        .is_some_and(|since| DateTimeUtc::from_system_time(generated_at) <= since)
}

/// HEAD and 304 responses carry headers only.
fn outgoing_body(method: &Method, status: u16, body: Vec<u8>) -> Vec<u8> {
    if *method == Method::Head || status == 304 {
        Vec::new()
    } else {
        body
    }
}

fn send(
    request: Request,
    status: u16,
    content_type: &str,
    body: Vec<u8>,
    extra: &[(&str, &str)],
) -> Result<()> {
    let body = outgoing_body(request.method(), status, body);

    let mut response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type)?)
        .with_header(make_header("Cache-Control", "no-cache")?);
    for (key, value) in extra {
        response.add_header(make_header(key, value)?);
    }

    request.respond(response)?;
    Ok(())
}

fn make_header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key.as_bytes(), value.as_bytes())
        .map_err(|()| anyhow!("invalid header `{key}: {value}`"))
}
