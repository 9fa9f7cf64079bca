//! Static asset serving under a configured root directory.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::error::DispatchError;
use crate::http::response::{cache_control, TEXT_PLAIN};

#[derive(Debug, Clone)]
pub struct StaticFiles {
    dir: ServeDir,
    max_age_secs: Option<u64>,
}

impl StaticFiles {
    pub fn new(root: impl AsRef<std::path::Path>, max_age_secs: Option<u64>) -> Self {
        Self {
            dir: ServeDir::new(root).append_index_html_on_directories(true),
            max_age_secs,
        }
    }

    /// Serve `request`, keeping whatever status the file service reports.
    pub async fn serve(&self, request: Request) -> Response {
        let response = match self.dir.clone().oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        };

        let status = response.status();
        if status == DispatchError::NotFound.status() {
            return DispatchError::NotFound.into_response();
        }

        let mut response = response;
        let headers = response.headers_mut();
        if !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
        }
        if let (Some(max_age), true) = (self.max_age_secs, status.is_success()) {
            headers.insert(header::CACHE_CONTROL, cache_control(max_age));
        }
        response
    }
}
