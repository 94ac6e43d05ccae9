//! Request tracing middleware.
//!
//! Every request runs inside a span carrying its request ID, taken from the
//! `X-Request-ID` header when the caller supplies one.

use axum::{
    body::Body,
    http::{header::HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Longest caller-supplied request ID that is accepted as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

fn incoming_request_id(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
}

/// Middleware that extracts or generates a request ID, logs completion and
/// echoes the ID in the response headers.
pub async fn trace_id(req: Request<Body>, next: Next) -> Response {
    let request_id = incoming_request_id(&req).unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let start = std::time::Instant::now();
        let mut response = next.run(req).await;

        tracing::info!(
            status = response.status().as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );

        if let Ok(header_value) = HeaderValue::from_str(&request_id) {
            response
                .headers_mut()
                .insert(HeaderName::from_static("x-request-id"), header_value);
        }
        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_header(value: &str) -> Request<Body> {
        Request::builder()
            .uri("/")
            .header(REQUEST_ID_HEADER, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_incoming_request_id_used() {
        let req = request_with_header("req-123_abc.xyz");
        assert_eq!(incoming_request_id(&req).as_deref(), Some("req-123_abc.xyz"));
    }

    #[test]
    fn test_incoming_request_id_rejects_blank_and_oversized() {
        assert_eq!(incoming_request_id(&request_with_header("   ")), None);
        let long = "a".repeat(MAX_REQUEST_ID_LEN + 1);
        assert_eq!(incoming_request_id(&request_with_header(&long)), None);

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(incoming_request_id(&req), None);
    }
}
