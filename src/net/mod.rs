//! Network layer subsystem.
//!
//! Plain TCP listeners are bound by the binary and handed to the HTTP server.
//! TLS is optional and loaded here from PEM files.

pub mod tls;

pub use tls::load_tls_config;
