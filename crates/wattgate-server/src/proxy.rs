//! Reverse proxy to the device's embedded web server
//!
//! Dashboard requests that miss the local web root are forwarded to the
//! gateway with the active session re-attached, and the upstream content
//! type and body are passed through unmodified. Only meaningful in local
//! mode; the cloud API has no equivalent web UI.

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use tracing::debug;
use wattgate_backend::{BackendError, LocalBackend, Result};

/// Forward `path_and_query` to the gateway's web server.
pub async fn proxy_to_gateway(backend: &LocalBackend, path_and_query: &str) -> Result<Response> {
    let url = format!(
        "{}/{}",
        backend.base_url(),
        path_and_query.trim_start_matches('/')
    );
    debug!("Proxy request to: {}", url);

    let mut request = backend.http_client().get(&url);
    if let Some(session) = backend.session() {
        if let Some(cookie) = session.cookie_header() {
            request = request.header(header::COOKIE, cookie);
        }
        if let Some(bearer) = session.bearer_header() {
            request = request.header(header::AUTHORIZATION, bearer);
        }
    }

    let upstream = request.send().await.map_err(BackendError::Http)?;
    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let body = upstream.bytes().await.map_err(BackendError::Http)?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}
