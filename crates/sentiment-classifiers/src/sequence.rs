//! Sentiment classifier backed by a DistilBERT sequence-classification model

use crate::classifier::{ClassificationResult, Classifier};
use crate::distilbert::{DistilBertConfig, DistilBertForSequenceClassification};
use crate::encoding::{prepare_tokenizer, EncodedBatch, DEFAULT_MAX_LENGTH};
use crate::model_store::{device_from_str, labels_from_config, ModelArtifact};
use candle_core::Device;
use sentiment_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokenizers::Tokenizer;

/// Runtime options shared by every loaded model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceOptions {
    /// Device name: `cpu`, `cuda` or `metal`
    #[serde(default = "default_device")]
    pub device: String,

    /// Longer inputs are truncated to this many tokens
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_max_length() -> usize {
    DEFAULT_MAX_LENGTH
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            device: default_device(),
            max_length: default_max_length(),
        }
    }
}

/// A loaded tokenizer + model pair producing labelled probabilities
pub struct SequenceClassifier {
    name: String,
    tokenizer: Tokenizer,
    model: DistilBertForSequenceClassification,
    labels: Vec<String>,
    device: Device,
}

impl SequenceClassifier {
    /// Load a classifier from a resolved artifact directory
    pub fn load(name: impl Into<String>, artifact: &ModelArtifact, options: &InferenceOptions) -> Result<Self> {
        let name = name.into();
        tracing::info!("Loading model '{}' from {}", name, artifact.dir().display());

        let device = device_from_str(&options.device)?;
        let raw_config = artifact.read_config()?;
        let config: DistilBertConfig = serde_json::from_value(raw_config.clone())
            .map_err(|e| Error::model(format!("Unsupported model config for '{}': {}", name, e)))?;
        let labels = labels_from_config(&raw_config);

        let max_length = options.max_length.min(config.max_position_embeddings);
        let tokenizer = prepare_tokenizer(artifact.load_tokenizer()?, max_length)?;

        let vb = artifact.var_builder(&device)?;
        let model = DistilBertForSequenceClassification::load(vb, &config, labels.len())
            .map_err(|e| Error::model(format!("Failed to build model '{}': {}", name, e)))?;

        tracing::info!(
            "Model '{}' loaded: {} layers, {} labels, max_length {}",
            name,
            config.n_layers,
            labels.len(),
            max_length
        );

        Ok(Self {
            name,
            tokenizer,
            model,
            labels,
            device,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Class probabilities for each text, in input order
    pub fn predict_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let batch = EncodedBatch::encode(&self.tokenizer, texts, &self.device)?;
        let probs = self
            .model
            .probabilities(&batch.input_ids, &batch.padding_mask)
            .map_err(|e| Error::classifier(format!("Model forward pass failed: {}", e)))?;
        probs
            .to_vec2::<f32>()
            .map_err(|e| Error::classifier(format!("Failed to read probabilities: {}", e)))
    }
}

impl Classifier for SequenceClassifier {
    fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let start = Instant::now();

        let probs = self.predict_batch(&[text])?;
        let row = probs
            .first()
            .ok_or_else(|| Error::classifier("Model returned no predictions"))?;

        let result =
            ClassificationResult::from_probabilities(&self.labels, row, start.elapsed().as_micros() as u64);
        tracing::debug!(
            model = %self.name,
            label = %result.label,
            score = result.score,
            latency_us = result.latency_us,
            "Classified text"
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
