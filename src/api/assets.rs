//! Static asset fallback for every path no API route claims.

use crate::state::AppState;
use crate::utils::constants::INDEX_DOCUMENT;
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("svg") => "image/svg+xml",
        _ => "text/plain; charset=utf-8",
    }
}

/// Maps a request path under `root`. `None` for anything that would step
/// outside it.
pub fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    if relative.is_empty() {
        return Some(root.join(INDEX_DOCUMENT));
    }
    let relative = Path::new(relative);
    if relative.components().all(|c| matches!(c, Component::Normal(_))) {
        Some(root.join(relative))
    } else {
        None
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

pub async fn serve(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let Some(path) = resolve(&state.settings.asset_dir(), uri.path()) else {
        log::warn!("rejected asset path {}", uri.path());
        return not_found();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(&path))], bytes).into_response(),
        Err(e) => {
            log::debug!("asset {} unavailable: {}", path.display(), e);
            not_found()
        }
    }
}
