//! Shared application state

use crate::config::ServerConfig;
use crate::inference::InferencePool;
use anyhow::{Context, Result};
use sentiment_classifiers::{Classifier, InferenceOptions, ModelArtifact, ModelSource, SequenceClassifier};
use sentiment_telemetry::PredictionMetrics;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Which model backs a prediction endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVariant {
    /// Off-the-shelf SST-2 baseline
    Naive,
    /// Model fine-tuned by the trainer
    Trained,
}

impl ModelVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Naive => "naive",
            Self::Trained => "trained",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Baseline classifier
    pub naive: Arc<dyn Classifier>,

    /// Fine-tuned classifier
    pub trained: Arc<dyn Classifier>,

    /// Bounded executor for inference calls
    pub pool: InferencePool,

    /// Prediction metrics rendered by the scrape listener
    pub metrics: PredictionMetrics,
}

impl AppState {
    /// Assemble state from already-loaded classifiers
    pub fn new(
        naive: Arc<dyn Classifier>,
        trained: Arc<dyn Classifier>,
        pool: InferencePool,
        metrics: PredictionMetrics,
    ) -> Self {
        Self {
            naive,
            trained,
            pool,
            metrics,
        }
    }

    /// Load both models described by `config`
    pub async fn load(config: &ServerConfig, metrics: PredictionMetrics) -> Result<Self> {
        info!("Initializing application state");

        let naive = load_classifier(ModelVariant::Naive, &config.models.naive, &config.inference).await?;
        let trained =
            load_classifier(ModelVariant::Trained, &config.models.trained, &config.inference).await?;

        let pool = InferencePool::new(config.inference_workers);
        info!("Inference pool ready with {} workers", pool.workers());

        Ok(Self::new(naive, trained, pool, metrics))
    }

    pub fn classifier(&self, variant: ModelVariant) -> Arc<dyn Classifier> {
        match variant {
            ModelVariant::Naive => self.naive.clone(),
            ModelVariant::Trained => self.trained.clone(),
        }
    }
}

/// Resolve and load one model on the blocking pool
async fn load_classifier(
    variant: ModelVariant,
    source: &ModelSource,
    options: &InferenceOptions,
) -> Result<Arc<dyn Classifier>> {
    info!("Loading {} model from {}", variant, source);

    let source = source.clone();
    let options = options.clone();
    let classifier = tokio::task::spawn_blocking(move || -> sentiment_core::Result<SequenceClassifier> {
        let artifact = ModelArtifact::resolve(&source)?;
        SequenceClassifier::load(variant.as_str(), &artifact, &options)
    })
    .await
    .context("Model loading task panicked")?
    .with_context(|| format!("Failed to load {} model", variant))?;

    Ok(Arc::new(classifier))
}
