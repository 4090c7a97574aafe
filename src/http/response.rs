//! HTTP response building module
//!
//! Builders for every response the placeholder server emits.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

/// Methods accepted on the placeholder route
pub const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

const NOT_FOUND_BODY: &str = "<!doctype html>\n<html lang=en>\n<title>404 Not Found</title>\n\
<h1>Not Found</h1>\n<p>The requested URL was not found on this server.</p>\n";

const METHOD_NOT_ALLOWED_BODY: &str = "<!doctype html>\n<html lang=en>\n\
<title>405 Method Not Allowed</title>\n<h1>Method Not Allowed</h1>\n\
<p>The method is not allowed for the requested URL.</p>\n";

/// Build 200 response carrying `body`; HEAD keeps the headers and drops the body
pub fn build_text_response(
    body: &'static str,
    server_name: &str,
    is_head: bool,
) -> Response<Full<Bytes>> {
    build_html(StatusCode::OK, body, server_name, is_head)
        .unwrap_or_else(|e| fallback("200", &e, StatusCode::OK))
}

/// Build 404 Not Found response
pub fn build_404_response(server_name: &str, is_head: bool) -> Response<Full<Bytes>> {
    build_html(StatusCode::NOT_FOUND, NOT_FOUND_BODY, server_name, is_head)
        .unwrap_or_else(|e| fallback("404", &e, StatusCode::NOT_FOUND))
}

/// Build 405 Method Not Allowed response
pub fn build_405_response(server_name: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Content-Type", HTML_CONTENT_TYPE)
        .header("Content-Length", METHOD_NOT_ALLOWED_BODY.len())
        .header("Allow", ALLOWED_METHODS)
        .header("Server", server_name)
        .body(Full::new(Bytes::from_static(
            METHOD_NOT_ALLOWED_BODY.as_bytes(),
        )))
        .unwrap_or_else(|e| fallback("405", &e, StatusCode::METHOD_NOT_ALLOWED))
}

/// Build OPTIONS response listing the allowed methods
pub fn build_options_response(server_name: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", HTML_CONTENT_TYPE)
        .header("Content-Length", 0)
        .header("Allow", ALLOWED_METHODS)
        .header("Server", server_name)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| fallback("OPTIONS", &e, StatusCode::OK))
}

fn build_html(
    status: StatusCode,
    body: &'static str,
    server_name: &str,
    is_head: bool,
) -> Result<Response<Full<Bytes>>, hyper::http::Error> {
    let data = if is_head {
        Bytes::new()
    } else {
        Bytes::from_static(body.as_bytes())
    };

    Response::builder()
        .status(status)
        .header("Content-Type", HTML_CONTENT_TYPE)
        .header("Content-Length", body.len())
        .header("Server", server_name)
        .body(Full::new(data))
}

/// Log the builder error and fall back to a bare response with the same status
fn fallback(label: &str, error: &hyper::http::Error, status: StatusCode) -> Response<Full<Bytes>> {
    crate::logger::log_error(&format!("Failed to build {label} response: {error}"));
    let mut resp = Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = status;
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(resp: Response<Full<Bytes>>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_text_response_head_keeps_length() {
        let resp = build_text_response("hello", "test-server", true);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["Content-Length"], "5");
        assert_eq!(resp.headers()["Server"], "test-server");
        assert_eq!(body_string(resp).await, "");
    }

    #[tokio::test]
    async fn test_404_body() {
        let resp = build_404_response("test-server", false);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()["Content-Type"], HTML_CONTENT_TYPE);
        assert!(body_string(resp).await.contains("<h1>Not Found</h1>"));
    }

    #[test]
    fn test_405_lists_allowed_methods() {
        let resp = build_405_response("test-server");
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()["Allow"], ALLOWED_METHODS);
    }

    #[test]
    fn test_invalid_server_name_falls_back() {
        let resp = build_404_response("bad\nname", false);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(resp.headers().get("Server").is_none());
    }
}
