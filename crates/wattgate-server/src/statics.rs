//! Static dashboard assets
//!
//! Files under the configured web root are served before falling back to the
//! device's own web server. Lookups are sanitized; anything escaping the
//! root reads as not-found.

use std::path::Path;
use tracing::debug;

/// Read a file from the web root, returning its bytes and content type.
pub async fn get_static(web_root: &Path, path: &str) -> Option<(Vec<u8>, &'static str)> {
    let relative = path.trim_start_matches('/');
    if relative.is_empty()
        || relative.split('/').any(|part| part == ".." || part.is_empty())
    {
        return None;
    }
    let file = web_root.join(relative);
    match tokio::fs::read(&file).await {
        Ok(bytes) => {
            debug!("Served from local web root: {}", path);
            Some((bytes, content_type_for(path)))
        }
        Err(_) => None,
    }
}

/// Content type by file extension; unknown extensions are opaque bytes.
pub fn content_type_for(path: &str) -> &'static str {
    let extension = path.rsplit('.').next().unwrap_or("");
    match extension.to_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "txt" => "text/plain",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}
