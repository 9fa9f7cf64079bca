//! Headless rendering client.
//!
//! # Data Flow
//! ```text
//! render(url)
//!     → GET <render.endpoint>?url=<url>   (headless browser service)
//!     → wait for the fully executed page (bounded by render.timeout_secs)
//!     → charset normalization
//!     → HTML ready for caching
//! ```
//!
//! # Design Decisions
//! - The timeout lives here, not at the request level
//! - A client disconnect does not cancel an in-flight render

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::charset;
use crate::config::RenderConfig;
use crate::error::UpstreamError;

#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Render `url` after JavaScript execution and return its HTML.
    async fn render(&self, url: &str) -> Result<String, UpstreamError>;
}

/// Client for an HTTP rendering service.
#[derive(Debug, Clone)]
pub struct HttpRenderBackend {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpRenderBackend {
    pub fn new(config: &RenderConfig) -> Result<Self, UpstreamError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|_| UpstreamError::InvalidUrl(config.endpoint.clone()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl RenderBackend for HttpRenderBackend {
    async fn render(&self, url: &str) -> Result<String, UpstreamError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("url", url)])
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        let document = charset::normalize(&body, content_type.as_deref());
        tracing::debug!(url = %url, bytes = body.len(), "Page rendered");
        Ok(document.html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, routing::get, Router};
    use std::collections::HashMap;

    async fn start_render_service() -> String {
        let app = Router::new()
            .route(
                "/render",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    match params.get("url") {
                        Some(url) => (
                            axum::http::StatusCode::OK,
                            [("content-type", "text/html; charset=utf-8")],
                            format!("<html><body>rendered {}</body></html>", url),
                        ),
                        None => (
                            axum::http::StatusCode::BAD_REQUEST,
                            [("content-type", "text/plain")],
                            String::new(),
                        ),
                    }
                }),
            )
            .route(
                "/broken",
                get(|| async { axum::http::StatusCode::BAD_GATEWAY }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn renders_through_service() {
        let base = start_render_service().await;
        let backend = HttpRenderBackend::new(&RenderConfig {
            endpoint: format!("{}/render", base),
            timeout_secs: 5,
        })
        .unwrap();

        let html = backend.render("https://example.com/?q=1").await.unwrap();
        assert_eq!(html, "<html><body>rendered https://example.com/?q=1</body></html>");
    }

    #[tokio::test]
    async fn service_errors_are_upstream_errors() {
        let base = start_render_service().await;
        let backend = HttpRenderBackend::new(&RenderConfig {
            endpoint: format!("{}/broken", base),
            timeout_secs: 5,
        })
        .unwrap();

        let err = backend.render("https://example.com").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status(502)));
    }

    #[test]
    fn rejects_bad_endpoint() {
        let err = HttpRenderBackend::new(&RenderConfig {
            endpoint: "::".into(),
            timeout_secs: 5,
        })
        .unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidUrl(_)));
    }
}
