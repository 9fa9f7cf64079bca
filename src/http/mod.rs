//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID + trace layers)
//!     → [dispatch layer classifies and runs a pipeline]
//!     → request.rs (query parameters, upgrade detection)
//!     → static_files.rs (assets under the static root)
//!     → response.rs (gzip negotiation, Cache-Control)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod static_files;

pub use request::X_REQUEST_ID;
pub use response::ResponseEncoder;
pub use server::{HttpServer, StartupError};
pub use static_files::StaticFiles;
