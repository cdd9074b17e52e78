//! Response header hardening.
//!
//! Strips headers that fingerprint the server stack and adds the standard
//! browser protections. Applied outermost so gate rejections get it too.

use axum::extract::Request;
use axum::http::header::{HeaderMap, HeaderValue, SERVER, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS};
use axum::middleware::Next;
use axum::response::Response;

const X_POWERED_BY: &str = "x-powered-by";

pub fn harden(headers: &mut HeaderMap) {
    headers.remove(SERVER);
    headers.remove(X_POWERED_BY);
    headers
        .entry(X_CONTENT_TYPE_OPTIONS)
        .or_insert(HeaderValue::from_static("nosniff"));
    headers
        .entry(X_FRAME_OPTIONS)
        .or_insert(HeaderValue::from_static("DENY"));
}

pub async fn harden_response_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    harden(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harden() {
        let mut headers = HeaderMap::new();
        headers.insert(SERVER, HeaderValue::from_static("nginx/1.25"));
        headers.insert(X_POWERED_BY, HeaderValue::from_static("Django"));
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));

        harden(&mut headers);

        assert!(headers.get(SERVER).is_none());
        assert!(headers.get(X_POWERED_BY).is_none());
        assert_eq!(headers[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[X_FRAME_OPTIONS], "SAMEORIGIN", "upstream choice kept");
    }
}
