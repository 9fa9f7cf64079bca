//! Outbound page fetching for the decode-proxy pipeline.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::header::CONTENT_TYPE;

use crate::config::FetchConfig;
use crate::error::UpstreamError;

/// Raw upstream response.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: Bytes,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, UpstreamError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, UpstreamError> {
        let url = reqwest::Url::parse(url).map_err(|_| UpstreamError::InvalidUrl(url.to_string()))?;
        let response = self.client.get(url).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        Ok(FetchedPage { body, content_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};

    #[tokio::test]
    async fn fetches_body_and_content_type() {
        let app = Router::new().route(
            "/page",
            get(|| async { ([("content-type", "text/html; charset=euc-jp")], "<p>hi</p>") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        let page = fetcher.fetch(&format!("http://{}/page", addr)).await.unwrap();
        assert_eq!(&page.body[..], b"<p>hi</p>");
        assert_eq!(page.content_type.as_deref(), Some("text/html; charset=euc-jp"));

        let missing = fetcher.fetch(&format!("http://{}/other", addr)).await.unwrap_err();
        assert!(matches!(missing, UpstreamError::Status(404)));
    }

    #[tokio::test]
    async fn rejects_unparseable_targets() {
        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        let err = fetcher.fetch("https://").await.unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidUrl(_)));
    }
}
