//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by handler and status code
//! - `proxy_request_duration_seconds` (histogram): latency by handler
//!
//! # Design Decisions
//! - The registry owns its recorder; nothing is installed globally
//! - Histogram buckets tuned for cache hits through full page renders

use std::time::{Duration, Instant};

use metrics::{Key, Label, Level, Metadata, Recorder};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

pub const REQUESTS_TOTAL: &str = "proxy_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "proxy_request_duration_seconds";

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

static METADATA: Metadata<'static> = Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// One finished request.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricObservation {
    pub handler: &'static str,
    pub status_code: u16,
    pub elapsed_seconds: f64,
}

impl MetricObservation {
    pub fn since(handler: &'static str, status_code: u16, start: Instant) -> Self {
        Self {
            handler,
            status_code,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        }
    }
}

/// Counters and histograms rendered in the Prometheus text format.
pub struct MetricsRegistry {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
                LATENCY_BUCKETS,
            )?
            .build_recorder();
        let handle = recorder.handle();
        Ok(Self { recorder, handle })
    }

    pub fn observe(&self, observation: MetricObservation) {
        let handler = Label::new("handler", observation.handler);
        let counter_key = Key::from_parts(
            REQUESTS_TOTAL,
            vec![handler.clone(), Label::new("code", observation.status_code.to_string())],
        );
        self.recorder
            .register_counter(&counter_key, &METADATA)
            .increment(1);

        let histogram_key = Key::from_parts(REQUEST_DURATION_SECONDS, vec![handler]);
        self.recorder
            .register_histogram(&histogram_key, &METADATA)
            .record(observation.elapsed_seconds);
    }

    /// Prometheus exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Drain histogram buffers. Call periodically when scrapes are rare.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }

    /// Spawn a task calling [`run_upkeep`](Self::run_upkeep) every `interval`.
    pub fn spawn_upkeep(self: &std::sync::Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.run_upkeep();
            }
        })
    }
}
