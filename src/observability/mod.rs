//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every dispatched request produces:
//!     → logging.rs (structured log events, request ID in the trace span)
//!     → metrics.rs (one MetricObservation: handler, status, latency)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → GET /metrics (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

pub use metrics::{MetricObservation, MetricsRegistry};
