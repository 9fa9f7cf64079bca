//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the dispatcher and its collaborators from config
//! - Create the Axum Router with a single fallback handler
//! - Wire up middleware (request ID, tracing)
//! - Serve plain TCP or TLS with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    response::Response,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::cache::{CacheError, CacheTier, MemoryRemoteCache, RedisCache, RemoteCache};
use crate::config::ProxyConfig;
use crate::dispatch::{CachePolicy, Dispatcher, DispatcherParts};
use crate::error::UpstreamError;
use crate::fetch::HttpFetcher;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::static_files::StaticFiles;
use crate::observability::MetricsRegistry;
use crate::render::HttpRenderBackend;
use crate::tunnel::{DisabledTunnel, HttpTunnel, TunnelAdapter};

const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Fatal problems while assembling the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("remote cache unavailable: {0}")]
    Cache(#[from] CacheError),
    #[error("HTTP client setup failed: {0}")]
    Client(#[from] UpstreamError),
    #[error("metrics setup failed: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("invalid address {0:?}")]
    Address(String),
}

/// HTTP server for the render proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    /// Build every collaborator described by `config`.
    pub async fn from_config(config: ProxyConfig) -> Result<Self, StartupError> {
        let remote: Arc<dyn RemoteCache> = match &config.cache.redis_url {
            Some(url) => Arc::new(RedisCache::connect(url).await?),
            None => {
                tracing::warn!("No redis_url configured; remote cache tier is process-local");
                Arc::new(MemoryRemoteCache::new())
            }
        };
        let cache = Arc::new(CacheTier::from_config(&config.cache, remote));

        let tunnel: Arc<dyn TunnelAdapter> = if config.tunnel.enabled {
            let upstream: SocketAddr = config
                .tunnel
                .upstream
                .parse()
                .map_err(|_| StartupError::Address(config.tunnel.upstream.clone()))?;
            Arc::new(HttpTunnel::new(config.tunnel.path_prefix.clone(), upstream))
        } else {
            Arc::new(DisabledTunnel)
        };

        let dispatcher = Dispatcher::new(DispatcherParts {
            routes: config.routes.clone(),
            policy: CachePolicy::from_config(&config.cache, &config.headers),
            cache,
            renderer: Arc::new(HttpRenderBackend::new(&config.render)?),
            fetcher: Arc::new(HttpFetcher::new(&config.fetch)?),
            tunnel,
            static_files: StaticFiles::new(&config.static_files.root, config.static_files.max_age_secs),
            metrics: Arc::new(MetricsRegistry::new()?),
        });

        tracing::info!(
            render_endpoint = %config.render.endpoint,
            static_root = %config.static_files.root,
            tunnel_enabled = config.tunnel.enabled,
            local_capacity = config.cache.local_capacity,
            "Dispatcher assembled"
        );

        Ok(Self::new(config, Arc::new(dispatcher)))
    }

    /// Create a server around an existing dispatcher.
    pub fn new(config: ProxyConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let router = Self::build_router(dispatcher.clone());
        Self {
            router,
            config,
            dispatcher,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(dispatcher: Arc<Dispatcher>) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(dispatcher)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            )
    }

    /// Run the server on a plain TCP listener until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let upkeep = self.dispatcher.metrics().spawn_upkeep(METRICS_UPKEEP_INTERVAL);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        upkeep.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let upkeep = self.dispatcher.metrics().spawn_upkeep(METRICS_UPKEEP_INTERVAL);
        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        upkeep.abort();
        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

async fn dispatch_handler(State(dispatcher): State<Arc<Dispatcher>>, request: Request) -> Response {
    dispatcher.dispatch(request).await
}
