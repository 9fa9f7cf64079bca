//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the render proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS, workers).
    pub listener: ListenerConfig,

    /// Path prefixes used to classify requests.
    pub routes: RouteConfig,

    /// Two-tier cache settings.
    pub cache: CacheConfig,

    /// Cache-Control max-age values sent to clients.
    pub headers: HeaderConfig,

    /// Headless rendering service.
    pub render: RenderConfig,

    /// Outbound fetches for the decode-proxy pipeline.
    pub fetch: FetchConfig,

    /// Generic tunnel forwarding.
    pub tunnel: TunnelConfig,

    /// Static file serving.
    pub static_files: StaticFilesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Tokio worker threads. `None` uses one per core.
    pub workers: Option<usize>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            workers: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Request classification prefixes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Prefix of the rendering pipeline (`/render?url=...`).
    pub render_prefix: String,

    /// Prefix of the decode-proxy pipeline (`/proxy/<host-and-path>`).
    pub proxy_prefix: String,

    /// Exact path of the metrics endpoint.
    pub metrics_path: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            render_prefix: "/render".to_string(),
            proxy_prefix: "/proxy/".to_string(),
            metrics_path: "/metrics".to_string(),
        }
    }
}

/// Cache tier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis connection string for the shared tier.
    /// Without one the shared tier is kept in process.
    pub redis_url: Option<String>,

    /// Maximum entries held by the local tier before LRU eviction.
    pub local_capacity: usize,

    /// Fixed TTL of local entries in seconds.
    pub local_ttl_secs: u64,

    /// Remote TTL of rendered pages in seconds.
    pub render_ttl_secs: u64,

    /// Remote TTL of decode-proxied pages in seconds.
    pub proxy_ttl_secs: u64,

    /// Copy remote hits into the local tier.
    pub promote_remote_hits: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            local_capacity: 500,
            local_ttl_secs: 120,
            render_ttl_secs: 30,
            proxy_ttl_secs: 60,
            promote_remote_hits: true,
        }
    }
}

/// `Cache-Control: public, max-age=N` values per handler.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub render_max_age_secs: u64,
    pub proxy_max_age_secs: u64,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            render_max_age_secs: 30,
            proxy_max_age_secs: 60,
        }
    }
}

/// Headless rendering service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Endpoint receiving `GET <endpoint>?url=<target>` and answering with rendered HTML.
    pub endpoint: String,

    /// Upper bound of a full page load in seconds.
    pub timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3000/render".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Outbound fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Total fetch timeout in seconds.
    pub timeout_secs: u64,

    /// User-Agent sent upstream.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: concat!("render-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Tunnel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Enable the tunnel adapter.
    pub enabled: bool,

    /// Requests under this prefix belong to the tunnel.
    pub path_prefix: String,

    /// Upstream address (e.g., "127.0.0.1:9000").
    pub upstream: String,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path_prefix: "/tunnel/".to_string(),
            upstream: "127.0.0.1:9000".to_string(),
        }
    }
}

/// Static file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Root directory.
    pub root: String,

    /// Optional max-age for successful static responses.
    pub max_age_secs: Option<u64>,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: "public".to_string(),
            max_age_secs: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
