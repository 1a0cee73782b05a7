//! Bounded blocking-pool execution of classifier calls

use sentiment_classifiers::{ClassificationResult, Classifier};
use sentiment_core::{Error, Result};
use sentiment_telemetry::PredictionMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Runs classifiers on Tokio's blocking pool, at most `workers` at a time
#[derive(Clone)]
pub struct InferencePool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl InferencePool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of calls that could start right now without waiting
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Classify `text` off the async runtime
    pub async fn classify(
        &self,
        classifier: Arc<dyn Classifier>,
        text: String,
    ) -> Result<ClassificationResult> {
        self.classify_timed(classifier, text)
            .await
            .map(|(result, _)| result)
    }

    /// Classify `text` and report how long the classifier itself ran
    ///
    /// Time spent waiting for a free worker is not included.
    pub async fn classify_timed(
        &self,
        classifier: Arc<dyn Classifier>,
        text: String,
    ) -> Result<(ClassificationResult, Duration)> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| Error::internal(format!("Inference pool closed: {}", e)))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let start = Instant::now();
            let result = classifier.classify(&text)?;
            Ok((result, start.elapsed()))
        })
        .await
        .map_err(|e| Error::internal(format!("Inference task failed: {}", e)))?
    }
}

/// Classify one text and record it in `metrics`
///
/// The request is counted before inference starts; duration and score are
/// only observed when the classifier succeeds. The recorded duration covers
/// the classifier call only, not time queued for a worker.
pub async fn predict(
    pool: &InferencePool,
    metrics: &PredictionMetrics,
    classifier: Arc<dyn Classifier>,
    text: String,
) -> Result<ClassificationResult> {
    metrics.record_request();

    let (result, elapsed) = pool.classify_timed(classifier, text).await?;

    metrics.record_prediction(elapsed, result.score);
    Ok(result)
}
