//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request
//!     → classify.rs (ordered rules: render → proxy → tunnel → metrics → static)
//!     → Render:      cache(render:url) → render backend → cache set → encoder
//!     → DecodeProxy: cache(fetch:url) → fetch → charset → cache set → encoder
//!     → Tunnel:      adapter owns the whole exchange
//!     → Metrics:     exposition text
//!     → Static:      file service under the static root
//!     → exactly one MetricObservation
//! ```
//!
//! # Design Decisions
//! - Collaborators are injected; the dispatcher owns no global state
//! - Render and proxy failures, panics included, become 500 responses
//! - A 400 for a missing `url` is decided before any cache or backend call

pub mod classify;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::Request,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};

pub use classify::{Classification, ClassifiedRequest, Classifier, Rule};

use crate::cache::{CacheKey, CacheTier};
use crate::charset;
use crate::config::{CacheConfig, HeaderConfig, RouteConfig};
use crate::error::DispatchError;
use crate::fetch::PageFetcher;
use crate::http::request::request_id;
use crate::http::response::{accepts_gzip, ResponseEncoder, TEXT_HTML};
use crate::http::static_files::StaticFiles;
use crate::observability::{MetricObservation, MetricsRegistry};
use crate::render::RenderBackend;
use crate::tunnel::TunnelAdapter;

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Rendered or decoded page as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    pub html: String,
    pub charset_normalized: bool,
}

/// TTLs and client max-age values per pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub render_ttl: Duration,
    pub proxy_ttl: Duration,
    pub render_max_age_secs: u64,
    pub proxy_max_age_secs: u64,
}

impl CachePolicy {
    pub fn from_config(cache: &CacheConfig, headers: &HeaderConfig) -> Self {
        Self {
            render_ttl: Duration::from_secs(cache.render_ttl_secs),
            proxy_ttl: Duration::from_secs(cache.proxy_ttl_secs),
            render_max_age_secs: headers.render_max_age_secs,
            proxy_max_age_secs: headers.proxy_max_age_secs,
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default(), &HeaderConfig::default())
    }
}

/// Everything the dispatcher depends on.
pub struct DispatcherParts {
    pub routes: RouteConfig,
    pub policy: CachePolicy,
    pub cache: Arc<CacheTier>,
    pub renderer: Arc<dyn RenderBackend>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub tunnel: Arc<dyn TunnelAdapter>,
    pub static_files: StaticFiles,
    pub metrics: Arc<MetricsRegistry>,
}

pub struct Dispatcher {
    classifier: Classifier,
    policy: CachePolicy,
    cache: Arc<CacheTier>,
    renderer: Arc<dyn RenderBackend>,
    fetcher: Arc<dyn PageFetcher>,
    tunnel: Arc<dyn TunnelAdapter>,
    static_files: StaticFiles,
    metrics: Arc<MetricsRegistry>,
    encoder: ResponseEncoder,
}

impl Dispatcher {
    pub fn new(parts: DispatcherParts) -> Self {
        Self {
            classifier: Classifier::new(parts.routes, parts.tunnel.clone()),
            policy: parts.policy,
            cache: parts.cache,
            renderer: parts.renderer,
            fetcher: parts.fetcher,
            tunnel: parts.tunnel,
            static_files: parts.static_files,
            metrics: parts.metrics,
            encoder: ResponseEncoder::default(),
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Produce exactly one response and one metric observation.
    pub async fn dispatch(&self, request: Request) -> Response {
        let start = Instant::now();
        let classified = self.classifier.classify(&request);
        let handler = classified.classification.handler();
        let request_id = request_id(request.headers()).to_owned();
        let gzip = accepts_gzip(request.headers());

        tracing::debug!(
            request_id = %request_id,
            method = %request.method(),
            url = %classified.raw_url,
            handler,
            "Dispatching request"
        );

        let response = match classified.classification {
            Classification::Metrics => {
                // Observed before rendering so the scrape always includes it.
                self.metrics.observe(MetricObservation::since(handler, 200, start));
                return self
                    .encoder
                    .encode(self.metrics.render(), PROMETHEUS_TEXT, None, gzip);
            }
            Classification::Tunnel => {
                if self.tunnel.owns_upgrade(&request) {
                    self.tunnel.handle_upgrade(request).await
                } else {
                    self.tunnel.handle(request).await
                }
            }
            Classification::Static => self.static_files.serve(request).await,
            Classification::Render | Classification::DecodeProxy => {
                drop(request);
                self.run_guarded(&classified, gzip, &request_id).await
            }
        };

        let status = response.status().as_u16();
        self.metrics.observe(MetricObservation::since(handler, status, start));
        tracing::debug!(
            request_id = %request_id,
            handler,
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request finished"
        );
        response
    }

    /// Run a fetching pipeline, turning errors and panics into responses.
    async fn run_guarded(&self, classified: &ClassifiedRequest, gzip: bool, request_id: &str) -> Response {
        let target = classified.target_url.as_deref();
        let pipeline = async {
            match classified.classification {
                Classification::Render => self.render_page(target, gzip).await,
                _ => self.proxy_page(target, gzip).await,
            }
        };

        let error = match AssertUnwindSafe(pipeline).catch_unwind().await {
            Ok(Ok(response)) => return response,
            Ok(Err(error)) => error,
            Err(panic) => DispatchError::Internal(panic_message(panic.as_ref())),
        };

        match &error {
            DispatchError::ClientError(reason) => {
                tracing::info!(request_id = %request_id, url = %classified.raw_url, reason, "Rejected request");
            }
            _ => {
                tracing::error!(
                    request_id = %request_id,
                    url = %classified.raw_url,
                    target = ?target,
                    error = %error,
                    "Pipeline failed"
                );
            }
        }
        error.into_response()
    }

    async fn render_page(&self, target: Option<&str>, gzip: bool) -> Result<Response, DispatchError> {
        let url = target.ok_or(DispatchError::ClientError("Missing required parameter: url"))?;
        let key = CacheKey::render(url);

        let page = match self.cached_page(&key).await {
            Some(page) => page,
            None => {
                let html = self.renderer.render(url).await?;
                let page = PageResult {
                    html,
                    charset_normalized: true,
                };
                self.store_page(&key, &page, self.policy.render_ttl).await;
                page
            }
        };

        Ok(self
            .encoder
            .encode(page.html, TEXT_HTML, Some(self.policy.render_max_age_secs), gzip))
    }

    async fn proxy_page(&self, target: Option<&str>, gzip: bool) -> Result<Response, DispatchError> {
        let url = target.ok_or(DispatchError::ClientError("Missing proxy target"))?;
        let key = CacheKey::fetch(url);

        let page = match self.cached_page(&key).await {
            Some(page) => page,
            None => {
                let fetched = self.fetcher.fetch(url).await?;
                let document = charset::normalize(&fetched.body, fetched.content_type.as_deref());
                let page = PageResult {
                    html: document.html,
                    charset_normalized: document.charset_normalized,
                };
                self.store_page(&key, &page, self.policy.proxy_ttl).await;
                page
            }
        };

        Ok(self
            .encoder
            .encode(page.html, TEXT_HTML, Some(self.policy.proxy_max_age_secs), gzip))
    }

    async fn cached_page(&self, key: &CacheKey) -> Option<PageResult> {
        let bytes = self.cache.get(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(page) => Some(page),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    async fn store_page(&self, key: &CacheKey, page: &PageResult, ttl: Duration) {
        match serde_json::to_vec(page) {
            Ok(bytes) => self.cache.set(key, Bytes::from(bytes), ttl).await,
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to encode cache entry"),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "pipeline panicked".to_string()
    }
}
