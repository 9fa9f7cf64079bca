//! Caching render proxy library.
//!
//! Routes every request through one dispatcher: render through a headless
//! renderer, fetch and transcode to UTF-8, tunnel to a backend, expose
//! metrics, or serve static files.

pub mod cache;
pub mod charset;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod render;
pub mod tunnel;

pub use config::schema::ProxyConfig;
pub use dispatch::Dispatcher;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
