//! Sentiment Telemetry
//!
//! Prometheus metrics for the prediction service: a request counter and
//! histograms of prediction duration and sentiment score, kept in a registry
//! owned by the service rather than a process-global recorder.

pub mod metrics;

pub use crate::metrics::{MetricsSnapshot, PredictionMetrics, UPKEEP_INTERVAL};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::metrics::{MetricsSnapshot, PredictionMetrics};
}
