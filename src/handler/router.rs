//! Request routing dispatch module
//!
//! Entry point for HTTP request processing, responsible for route matching,
//! method validation and dispatching to the page handlers.

use crate::config::{AppState, SiteConfig};
use crate::handler::frame::is_frame_request;
use crate::handler::{site, static_files};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::pages::Page;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Buf, Bytes};
use hyper::http::request::Parts;
use hyper::{HeaderMap, Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Route selected for a request path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Home,
    About,
    Feedback,
    /// Path relative to the static directory
    Static(&'a str),
    Health,
    NotFound,
}

impl<'a> Route<'a> {
    /// Match a request path. Paths are exact; `/about/` is not `/about`.
    pub fn resolve(path: &'a str, site: &SiteConfig) -> Self {
        match path {
            "/" => Self::Home,
            "/about" => Self::About,
            "/feedback" => Self::Feedback,
            p if site.health.enabled && p == site.health.path => Self::Health,
            p => p
                .strip_prefix(static_files::STATIC_URL_PREFIX)
                .map_or(Self::NotFound, Self::Static),
        }
    }

    /// Value of the `Allow` header for this route
    pub const fn allow(self) -> &'static str {
        match self {
            Self::Feedback => "GET, HEAD, POST, OPTIONS",
            _ => "GET, HEAD, OPTIONS",
        }
    }

    fn permits(self, method: &Method) -> bool {
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS => true,
            Method::POST => self == Self::Feedback,
            _ => false,
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let config = &state.config;

    logger::log_headers(&parts.headers, config.logging.show_headers);

    let route = Route::resolve(parts.uri.path(), &config.site);
    let response = dispatch(&parts, body, route, &state).await;
    let response = http::with_server_header(response, &config.http.server_name);

    if config.logging.access_log {
        let entry = access_entry(&parts, &response, peer_addr, started);
        logger::log_access(&entry, &config.logging.access_log_format);
    }

    Ok(response)
}

async fn dispatch<B>(
    parts: &Parts,
    body: B,
    route: Route<'_>,
    state: &AppState,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let config = &state.config;

    if route == Route::NotFound {
        return http::build_404_response();
    }

    // 1. Check HTTP method
    if parts.method == Method::OPTIONS {
        return http::build_options_response(route.allow(), config.http.enable_cors);
    }
    if !route.permits(&parts.method) {
        logger::log_warning(&format!(
            "Method not allowed: {} {}",
            parts.method,
            parts.uri.path()
        ));
        return http::build_405_response(route.allow());
    }

    // 2. Dispatch
    let is_head = parts.method == Method::HEAD;
    match route {
        Route::Home => render_page(site::home(&parts.headers), is_head),
        Route::About => render_page(site::about(&parts.headers), is_head),
        Route::Feedback => {
            if parts.method == Method::POST {
                let limit = config.http.max_body_size;
                if let Some(resp) = limit.and_then(|max| check_body_size(&parts.headers, max)) {
                    return resp;
                }
                if let Err(resp) = discard_body(body, limit).await {
                    return resp;
                }
            }
            render_page(site::feedback(&parts.method, &parts.headers), is_head)
        }
        Route::Static(relative) => {
            let if_none_match = parts
                .headers
                .get("if-none-match")
                .and_then(|v| v.to_str().ok());
            static_files::serve(&config.site.static_dir, relative, if_none_match, is_head).await
        }
        Route::Health => http::build_health_response(is_head),
        Route::NotFound => http::build_404_response(),
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = headers.get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Read and drop a submitted form body frame by frame.
///
/// Nothing is buffered. With `max_body_size` set, the body is cut off with 413
/// as soon as the running total passes it.
async fn discard_body<B>(body: B, max_body_size: Option<u64>) -> Result<u64, Response<Full<Bytes>>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let mut body = std::pin::pin!(body);
    let mut received: u64 = 0;

    while let Some(frame) = body.frame().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                let e: BoxError = e.into();
                logger::log_warning(&format!("Failed to read request body: {e}"));
                return Err(http::build_400_response());
            }
        };
        if let Some(data) = frame.data_ref() {
            let len = u64::try_from(data.remaining()).unwrap_or(u64::MAX);
            received = received.saturating_add(len);
        }
        if let Some(max) = max_body_size.filter(|&max| received > max) {
            logger::log_error(&format!(
                "Request body exceeded {max} bytes while reading"
            ));
            return Err(http::build_413_response());
        }
    }

    logger::debug(&format!("Discarded {received} bytes of feedback form data"));
    Ok(received)
}

fn render_page(page: Page, is_head: bool) -> Response<Full<Bytes>> {
    match page.render() {
        Ok(html) => http::build_page_response(html, is_head),
        Err(e) => {
            logger::log_error(&format!(
                "Failed to render template '{}': {e}",
                page.template_name()
            ));
            http::build_500_response()
        }
    }
}

fn access_entry(
    parts: &Parts,
    response: &Response<Full<Bytes>>,
    peer_addr: SocketAddr,
    started: Instant,
) -> AccessLogEntry {
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        parts.method.to_string(),
        parts.uri.path().to_string(),
    );
    entry.query = parts.uri.query().map(ToString::to_string);
    entry.http_version = version_label(parts.version).to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
        .unwrap_or(usize::MAX);
    entry.referer = header("referer");
    entry.user_agent = header("user-agent");
    entry.frame_request = is_frame_request(&parts.headers);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}

const fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Overrides};
    use crate::handler::frame::FRAME_REQUEST_HEADER;

    fn test_state() -> Arc<AppState> {
        test_state_with_limit(None)
    }

    fn test_state_with_limit(max_body_size: Option<u64>) -> Arc<AppState> {
        let mut cfg = Config::load_from("does-not-exist", &Overrides::default()).unwrap();
        cfg.logging.access_log = false;
        cfg.http.max_body_size = max_body_size;
        Arc::new(AppState::new(cfg))
    }

    fn request(method: Method, uri: &str) -> hyper::http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    async fn send(req: Request<Full<Bytes>>) -> (Response<()>, String) {
        send_to(test_state(), req).await
    }

    async fn send_to(state: Arc<AppState>, req: Request<Full<Bytes>>) -> (Response<()>, String) {
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let response = handle_request(req, state, peer).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();
        (
            Response::from_parts(parts, ()),
            String::from_utf8(bytes.to_vec()).unwrap(),
        )
    }

    fn empty() -> Full<Bytes> {
        Full::new(Bytes::new())
    }

    #[test]
    fn test_route_resolution() {
        let cfg = Config::load_from("does-not-exist", &Overrides::default()).unwrap();
        let site = &cfg.site;
        assert_eq!(Route::resolve("/", site), Route::Home);
        assert_eq!(Route::resolve("/about", site), Route::About);
        assert_eq!(Route::resolve("/feedback", site), Route::Feedback);
        assert_eq!(Route::resolve("/healthz", site), Route::Health);
        assert_eq!(
            Route::resolve("/static/data-frame.js", site),
            Route::Static("data-frame.js")
        );
        assert_eq!(Route::resolve("/about/", site), Route::NotFound);
        assert_eq!(Route::resolve("/static", site), Route::NotFound);
        assert_eq!(Route::resolve("/missing", site), Route::NotFound);
    }

    #[test]
    fn test_health_route_can_be_disabled() {
        let mut cfg = Config::load_from("does-not-exist", &Overrides::default()).unwrap();
        cfg.site.health.enabled = false;
        assert_eq!(Route::resolve("/healthz", &cfg.site), Route::NotFound);
    }

    #[tokio::test]
    async fn test_home_renders_full_document() {
        let (resp, body) = send(request(Method::GET, "/").body(empty()).unwrap()).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], "text/html; charset=utf-8");
        assert_eq!(resp.headers()["vary"], FRAME_REQUEST_HEADER);
        assert_eq!(resp.headers()["server"], "frame-site/0.1");
        assert!(body.contains("<!DOCTYPE html>"));
        assert!(body.contains("<h1>Home</h1>"));
    }

    #[tokio::test]
    async fn test_about_from_frame_renders_fragment() {
        let req = request(Method::GET, "/about")
            .header(FRAME_REQUEST_HEADER, "true")
            .body(empty())
            .unwrap();
        let (resp, body) = send(req).await;
        assert_eq!(resp.status(), 200);
        assert!(!body.contains("<!DOCTYPE html>"));
        assert!(body.contains("<h1>About</h1>"));
    }

    #[tokio::test]
    async fn test_uppercase_header_value_is_not_a_frame_request() {
        let req = request(Method::GET, "/")
            .header(FRAME_REQUEST_HEADER, "TRUE")
            .body(empty())
            .unwrap();
        let (_, body) = send(req).await;
        assert!(body.contains("<!DOCTYPE html>"));
    }

    #[tokio::test]
    async fn test_feedback_get_shows_form() {
        let (resp, body) = send(request(Method::GET, "/feedback").body(empty()).unwrap()).await;
        assert_eq!(resp.status(), 200);
        assert!(body.contains("<form"));
        assert!(!body.contains("Thank you"));
    }

    #[tokio::test]
    async fn test_feedback_post_with_empty_body_completes() {
        let (resp, body) = send(request(Method::POST, "/feedback").body(empty()).unwrap()).await;
        assert_eq!(resp.status(), 200);
        assert!(body.contains("<!DOCTYPE html>"));
        assert!(body.contains("Thank you"));
    }

    #[tokio::test]
    async fn test_feedback_post_from_frame_with_form_body() {
        let req = request(Method::POST, "/feedback")
            .header(FRAME_REQUEST_HEADER, "true")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Full::new(Bytes::from("name=Ada&message=hi")))
            .unwrap();
        let (resp, body) = send(req).await;
        assert_eq!(resp.status(), 200);
        assert!(!body.contains("<!DOCTYPE html>"));
        assert!(body.contains("Thank you"));
    }

    #[tokio::test]
    async fn test_large_feedback_post_completes_without_limit() {
        let big = "x".repeat(2 * 1024 * 1024);
        let req = request(Method::POST, "/feedback")
            .body(Full::new(Bytes::from(big)))
            .unwrap();
        let (resp, body) = send(req).await;
        assert_eq!(resp.status(), 200);
        assert!(body.contains("Thank you"));
    }

    #[tokio::test]
    async fn test_get_ignores_declared_content_length() {
        for state in [test_state(), test_state_with_limit(Some(64))] {
            let req = request(Method::GET, "/")
                .header("content-length", "2000000")
                .body(empty())
                .unwrap();
            let (resp, body) = send_to(state, req).await;
            assert_eq!(resp.status(), 200);
            assert!(body.contains("<h1>Home</h1>"));
        }
    }

    #[tokio::test]
    async fn test_configured_body_limit_rejects_feedback_post() {
        let big = "x".repeat(200);
        let req = request(Method::POST, "/feedback")
            .body(Full::new(Bytes::from(big)))
            .unwrap();
        let (resp, _) = send_to(test_state_with_limit(Some(64)), req).await;
        assert_eq!(resp.status(), 413);

        let req = request(Method::POST, "/feedback")
            .header("content-length", "1000")
            .body(empty())
            .unwrap();
        let (resp, _) = send_to(test_state_with_limit(Some(64)), req).await;
        assert_eq!(resp.status(), 413);

        let req = request(Method::POST, "/feedback")
            .body(Full::new(Bytes::from("x".repeat(64))))
            .unwrap();
        let (resp, body) = send_to(test_state_with_limit(Some(64)), req).await;
        assert_eq!(resp.status(), 200);
        assert!(body.contains("Thank you"));
    }

    #[tokio::test]
    async fn test_post_to_home_is_not_allowed() {
        let (resp, _) = send(request(Method::POST, "/").body(empty()).unwrap()).await;
        assert_eq!(resp.status(), 405);
        assert_eq!(resp.headers()["allow"], "GET, HEAD, OPTIONS");

        let (resp, _) = send(request(Method::PUT, "/feedback").body(empty()).unwrap()).await;
        assert_eq!(resp.status(), 405);
        assert_eq!(resp.headers()["allow"], "GET, HEAD, POST, OPTIONS");
    }

    #[tokio::test]
    async fn test_options_lists_methods() {
        let (resp, body) = send(request(Method::OPTIONS, "/feedback").body(empty()).unwrap()).await;
        assert_eq!(resp.status(), 204);
        assert_eq!(resp.headers()["allow"], "GET, HEAD, POST, OPTIONS");
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_head_has_length_but_no_body() {
        let (resp, body) = send(request(Method::HEAD, "/about").body(empty()).unwrap()).await;
        assert_eq!(resp.status(), 200);
        let length: usize = resp.headers()["content-length"]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(length > 0);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let (resp, _) = send(request(Method::GET, "/nope").body(empty()).unwrap()).await;
        assert_eq!(resp.status(), 404);
        let (resp, _) = send(request(Method::DELETE, "/nope").body(empty()).unwrap()).await;
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_static_asset_is_served() {
        let (resp, body) = send(
            request(Method::GET, "/static/data-frame.js")
                .body(empty())
                .unwrap(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers()["content-type"],
            "text/javascript; charset=utf-8"
        );
        assert!(body.contains("customElements.define(\"data-frame\""));
        assert!(resp.headers().contains_key("etag"));
    }

    #[tokio::test]
    async fn test_health_check() {
        let (resp, body) = send(request(Method::GET, "/healthz").body(empty()).unwrap()).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(body, "ok");
    }

    #[test]
    fn test_access_entry_fields() {
        let req = request(Method::GET, "/about?ref=nav")
            .header(FRAME_REQUEST_HEADER, "true")
            .header("user-agent", "curl/8.0")
            .body(())
            .unwrap();
        let (parts, ()) = req.into_parts();
        let response = http::build_page_response("<p>hi</p>".to_string(), false);
        let peer: SocketAddr = "10.1.2.3:5555".parse().unwrap();

        let entry = access_entry(&parts, &response, peer, Instant::now());
        assert_eq!(entry.remote_addr, "10.1.2.3");
        assert_eq!(entry.path, "/about");
        assert_eq!(entry.query.as_deref(), Some("ref=nav"));
        assert_eq!(entry.status, 200);
        assert_eq!(entry.body_bytes, 9);
        assert_eq!(entry.user_agent.as_deref(), Some("curl/8.0"));
        assert!(entry.frame_request);
    }
}
