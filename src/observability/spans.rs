//! Per-request tracing spans.

use axum::http::Request;
use tower_http::trace::MakeSpan;
use tracing::Span;

use crate::http::request::X_REQUEST_ID;

/// Opens one `request` span per HTTP request carrying the request ID, so
/// every event a gate stage logs can be correlated.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id,
        )
    }
}
