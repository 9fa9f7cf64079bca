//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (REDIS_URL / PORT / TLS_KEY / TLS_CERT overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CacheConfig, FetchConfig, HeaderConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    ProxyConfig, RenderConfig, RouteConfig, StaticFilesConfig, TlsConfig, TunnelConfig,
};
