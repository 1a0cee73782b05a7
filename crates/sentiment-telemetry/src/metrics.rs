//! Prediction metrics and Prometheus rendering
//!
//! Each service instance owns its own recorder. Nothing is installed as the
//! process-global `metrics` recorder, so independent instances (tests, or
//! several servers in one process) never share counts.
//!
//! Without a global install there is no background upkeep task either: the
//! owner calls [`PredictionMetrics::run_upkeep`] every [`UPKEEP_INTERVAL`]
//! to drain buffered histogram samples between scrapes.

use metrics::{Counter, Histogram, Key, KeyName, Level, Metadata, Recorder, SharedString};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use sentiment_core::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const REQUEST_COUNTER: &str = "prediction_request_total";
pub const DURATION_HISTOGRAM: &str = "prediction_duration_seconds";
pub const SCORE_HISTOGRAM: &str = "sentiment_score";

/// Conventional Prometheus client latency buckets, in seconds
pub const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

pub const SCORE_BUCKETS: &[f64] = &[0.0, 0.25, 0.5, 0.75, 1.0];

/// Matches the exporter's own upkeep period when installed globally
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Request counter plus duration and score histograms
#[derive(Clone)]
pub struct PredictionMetrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    handle: PrometheusHandle,
    requests: Counter,
    duration: Histogram,
    score: Histogram,

    total_requests: AtomicU64,
    total_predictions: AtomicU64,
    total_duration_us: AtomicU64,
}

impl PredictionMetrics {
    /// Build a fresh registry with all three series described
    pub fn new() -> Result<Self> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(DURATION_HISTOGRAM.to_string()), DURATION_BUCKETS)
            .and_then(|b| b.set_buckets_for_metric(Matcher::Full(SCORE_HISTOGRAM.to_string()), SCORE_BUCKETS))
            .map_err(|e| Error::internal(format!("Failed to configure metrics buckets: {}", e)))?
            .build_recorder();

        recorder.describe_counter(
            KeyName::from_const_str(REQUEST_COUNTER),
            None,
            SharedString::const_str("Total_requests"),
        );
        recorder.describe_histogram(
            KeyName::from_const_str(DURATION_HISTOGRAM),
            None,
            SharedString::const_str("Time_spent_processing_prediction"),
        );
        recorder.describe_histogram(
            KeyName::from_const_str(SCORE_HISTOGRAM),
            None,
            SharedString::const_str("histogram_of_sentiment_scores"),
        );

        let metadata = Metadata::new(module_path!(), Level::INFO, Some(module_path!()));
        let requests = recorder.register_counter(&Key::from_static_name(REQUEST_COUNTER), &metadata);
        let duration =
            recorder.register_histogram(&Key::from_static_name(DURATION_HISTOGRAM), &metadata);
        let score = recorder.register_histogram(&Key::from_static_name(SCORE_HISTOGRAM), &metadata);
        debug!(
            "Metrics registry built: {}, {}, {}",
            REQUEST_COUNTER, DURATION_HISTOGRAM, SCORE_HISTOGRAM
        );

        Ok(Self {
            inner: Arc::new(MetricsInner {
                handle: recorder.handle(),
                requests,
                duration,
                score,
                total_requests: AtomicU64::new(0),
                total_predictions: AtomicU64::new(0),
                total_duration_us: AtomicU64::new(0),
            }),
        })
    }

    /// Count an incoming prediction request
    pub fn record_request(&self) {
        self.inner.requests.increment(1);
        self.inner.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed prediction
    pub fn record_prediction(&self, duration: Duration, score: f32) {
        self.inner.score.record(f64::from(score));
        self.inner.duration.record(duration.as_secs_f64());

        self.inner.total_predictions.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_duration_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Prometheus text exposition of every series
    pub fn render(&self) -> String {
        self.inner.handle.render()
    }

    /// Fold buffered histogram samples into their buckets
    pub fn run_upkeep(&self) {
        self.inner.handle.run_upkeep();
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.inner.total_requests.load(Ordering::Relaxed),
            total_predictions: self.inner.total_predictions.load(Ordering::Relaxed),
            total_duration_us: self.inner.total_duration_us.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_predictions: u64,
    pub total_duration_us: u64,
}

impl MetricsSnapshot {
    /// Average duration of completed predictions
    pub fn avg_duration_us(&self) -> u64 {
        if self.total_predictions == 0 {
            0
        } else {
            self.total_duration_us / self.total_predictions
        }
    }

    /// Requests that never recorded a prediction
    pub fn failed_requests(&self) -> u64 {
        self.total_requests.saturating_sub(self.total_predictions)
    }
}
