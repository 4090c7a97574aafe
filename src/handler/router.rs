//! Request routing dispatch module
//!
//! Entry point for HTTP request processing. Only the root path is routed;
//! everything else is left to the hosting platform and answers 404 here.

use crate::config::AppState;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body as _, Bytes};
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// The one route this server answers
pub const INDEX_PATH: &str = "/";

/// Body returned for the index route
pub const PLACEHOLDER_BODY: &str = "Static files are served directly by App Engine";

/// Main entry point for HTTP request handling
///
/// The request body is never read, so any body type is accepted.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let live = state.live.read().await.clone();

    if live.show_headers {
        logger::log_headers(
            req.headers()
                .iter()
                .map(|(name, value)| (name.as_str(), value.to_str().unwrap_or("<non-ascii>"))),
        );
    }

    let response = route(
        req.method(),
        req.uri().path(),
        &state.config.http.server_name,
    );

    if state.cached_access_log.load(Ordering::Relaxed) {
        let entry = build_access_entry(&req, &response, peer_addr, started);
        logger::log_access(&entry, &live.access_log_format);
    }

    Ok(response)
}

/// Resolve a method and path to a response
pub fn route(method: &Method, path: &str, server_name: &str) -> Response<Full<Bytes>> {
    if path != INDEX_PATH {
        logger::log_debug(&format!("No route for {method} {path}"));
        return http::build_404_response(server_name, *method == Method::HEAD);
    }

    match *method {
        Method::GET => http::build_text_response(PLACEHOLDER_BODY, server_name, false),
        Method::HEAD => http::build_text_response(PLACEHOLDER_BODY, server_name, true),
        Method::OPTIONS => http::build_options_response(server_name),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method} {path}"));
            http::build_405_response(server_name)
        }
    }
}

fn build_access_entry<B>(
    req: &Request<B>,
    response: &Response<Full<Bytes>>,
    peer_addr: SocketAddr,
    started: Instant,
) -> AccessLogEntry {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0);
    entry.referer = header("referer");
    entry.user_agent = header("user-agent");
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
