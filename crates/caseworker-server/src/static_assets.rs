use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::path::{Component, Path, PathBuf};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Build artifacts served from a directory on disk, with single-page-app
/// fallback to the index document.
#[derive(Debug, Clone)]
pub struct StaticAssets {
    root: PathBuf,
    index_document: String,
}

impl StaticAssets {
    pub fn new(root: impl Into<PathBuf>, index_document: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            index_document: index_document.into(),
        }
    }

    /// Resolve a request path to a response.
    ///
    /// A miss falls back to the index document unless the request asked for
    /// a file with the index document's own extension, which keeps a missing
    /// `index.html` from falling back onto itself.
    pub async fn serve(&self, request_path: &str) -> Response {
        let relative = request_path.trim_start_matches('/');
        let relative = if relative.is_empty() {
            self.index_document.as_str()
        } else {
            relative
        };

        if escapes_root(relative) {
            debug!(path = request_path, "rejected asset path outside root");
            return not_found();
        }

        let requested = Path::new(relative);
        if let Some((file, len)) = open_file(&self.root.join(requested)).await {
            return stream_file(file, len, content_type_for(requested));
        }

        let index = Path::new(&self.index_document);
        if requested.extension() == index.extension() {
            debug!(path = request_path, "asset not found");
            return not_found();
        }

        debug!(path = request_path, "asset not found, serving index document");
        match open_file(&self.root.join(index)).await {
            Some((file, len)) => stream_file(file, len, content_type_for(index)),
            None => not_found(),
        }
    }
}

/// Fixed extension table; anything unlisted is served as `text/plain`.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("html") => "text/html",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "text/plain",
    }
}

fn escapes_root(relative: &str) -> bool {
    Path::new(relative)
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
}

async fn open_file(path: &Path) -> Option<(File, u64)> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    let file = File::open(path).await.ok()?;
    Some((file, metadata.len()))
}

fn stream_file(file: File, len: u64, content_type: &'static str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, len)
        .body(Body::from_stream(ReaderStream::new(file)))
        .unwrap_or_else(|_| not_found())
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}
