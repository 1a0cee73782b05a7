//! Fine-tuning loop
//!
//! Loads a pretrained DistilBERT encoder into a trainable variable store,
//! attaches a fresh two-class head and optimizes the whole network with
//! AdamW on cross-entropy loss.

use crate::batcher::{shuffled_batches, Batcher};
use crate::config::TrainConfig;
use crate::dataset::{Review, ReviewDataset};
use candle_core::{DType, Device, D};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sentiment_classifiers::{
    default_labels, device_from_str, label_maps, prepare_tokenizer, DistilBertConfig,
    DistilBertForSequenceClassification, EncodedBatch, ModelArtifact,
};
use sentiment_core::{Error, Result};
use serde_json::json;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

/// Positive/negative
pub const NUM_LABELS: usize = 2;

/// Loss summary for one pass over the data
#[derive(Debug, Clone, PartialEq)]
pub struct EpochStats {
    /// 1-based epoch number
    pub epoch: usize,
    pub epochs: usize,
    /// Summed batch loss divided by the number of batches
    pub avg_loss: f64,
    pub batches: usize,
    pub elapsed: Duration,
}

impl fmt::Display for EpochStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Epoch {}/{}, Loss: {:.4}", self.epoch, self.epochs, self.avg_loss)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub samples: usize,
    pub epochs: Vec<EpochStats>,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.epochs.last().map(|e| e.avg_loss)
    }
}

/// A pretrained encoder with a trainable classification head
pub struct Trainer {
    config: TrainConfig,
    base_config: serde_json::Value,
    tokenizer: Tokenizer,
    model: DistilBertForSequenceClassification,
    varmap: VarMap,
    device: Device,
    labels: Vec<String>,
}

impl Trainer {
    /// Resolve the base model and initialize the network from its weights
    pub fn from_config(config: &TrainConfig) -> Result<Self> {
        let device = device_from_str(&config.device)?;
        info!("Loading base model {} on {:?}", config.base_model, device);

        let base = ModelArtifact::resolve(&config.base_model)?;
        let base_config = base.read_config()?;
        let model_config: DistilBertConfig = serde_json::from_value(base_config.clone())
            .map_err(|e| Error::model(format!("Unsupported base model config: {}", e)))?;

        let max_length = config.max_length.min(model_config.max_position_embeddings);
        let tokenizer = prepare_tokenizer(base.load_tokenizer()?, max_length)?;
        let labels = default_labels(NUM_LABELS);

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = DistilBertForSequenceClassification::load(vb, &model_config, labels.len())
            .map_err(|e| Error::model(format!("Failed to build model: {}", e)))?;
        load_pretrained(&varmap, &base.weights_path(), &device)?;

        Ok(Self {
            config: config.clone(),
            base_config,
            tokenizer,
            model,
            varmap,
            device,
            labels,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Run every configured epoch over `dataset`
    ///
    /// `on_epoch` is called with each epoch's summary as soon as it finishes.
    pub fn train(
        &self,
        dataset: &ReviewDataset,
        mut on_epoch: impl FnMut(&EpochStats),
    ) -> Result<TrainingReport> {
        if dataset.is_empty() {
            return Err(Error::dataset("Cannot train on an empty dataset"));
        }

        let params = ParamsAdamW {
            lr: self.config.learning_rate,
            ..Default::default()
        };
        let mut optimizer = AdamW::new(self.varmap.all_vars(), params)
            .map_err(|e| Error::model(format!("Failed to create optimizer: {}", e)))?;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let batcher = Batcher::new(&self.tokenizer, &self.device, self.labels.len());
        let reviews = dataset.reviews();

        info!(
            "Training on {} reviews: {} epochs, batch size {}, lr {}",
            reviews.len(),
            self.config.epochs,
            self.config.batch_size,
            self.config.learning_rate
        );

        let mut epochs = Vec::with_capacity(self.config.epochs);
        for epoch in 1..=self.config.epochs {
            let start = Instant::now();
            let batches = shuffled_batches(reviews.len(), self.config.batch_size, &mut rng);

            let mut total_loss = 0.0f64;
            for (step, indices) in batches.iter().enumerate() {
                let batch_reviews: Vec<&Review> = indices.iter().map(|&idx| &reviews[idx]).collect();
                let batch = batcher.batch(&batch_reviews)?;

                let logits = self
                    .model
                    .forward_t(&batch.inputs.input_ids, &batch.inputs.padding_mask, true)
                    .map_err(|e| Error::model(format!("Forward pass failed: {}", e)))?;
                let loss = candle_nn::loss::cross_entropy(&logits, &batch.labels)
                    .map_err(|e| Error::model(format!("Loss computation failed: {}", e)))?;
                optimizer
                    .backward_step(&loss)
                    .map_err(|e| Error::model(format!("Optimizer step failed: {}", e)))?;

                let loss = loss
                    .to_scalar::<f32>()
                    .map_err(|e| Error::model(format!("Failed to read loss: {}", e)))?;
                if !loss.is_finite() {
                    warn!(epoch, step, "Non-finite training loss");
                }
                total_loss += f64::from(loss);
                debug!(epoch, step, loss, "Training step");
            }

            let stats = EpochStats {
                epoch,
                epochs: self.config.epochs,
                avg_loss: total_loss / batches.len() as f64,
                batches: batches.len(),
                elapsed: start.elapsed(),
            };
            info!(
                epoch,
                avg_loss = stats.avg_loss,
                elapsed_ms = stats.elapsed.as_millis() as u64,
                "Epoch complete"
            );
            on_epoch(&stats);
            epochs.push(stats);
        }

        Ok(TrainingReport {
            samples: reviews.len(),
            epochs,
        })
    }

    /// Predicted class index for each text
    pub fn predict(&self, texts: &[&str]) -> Result<Vec<usize>> {
        let batch = EncodedBatch::encode(&self.tokenizer, texts, &self.device)?;
        let logits = self
            .model
            .forward(&batch.input_ids, &batch.padding_mask)
            .map_err(|e| Error::classifier(format!("Model forward pass failed: {}", e)))?;
        let classes = logits
            .argmax(D::Minus1)
            .and_then(|t| t.to_vec1::<u32>())
            .map_err(|e| Error::classifier(format!("Failed to read predictions: {}", e)))?;
        Ok(classes.into_iter().map(|c| c as usize).collect())
    }

    /// Write weights, tokenizer and config as a servable artifact
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<ModelArtifact> {
        let artifact = ModelArtifact::create(dir)?;
        artifact.save_weights(&self.varmap)?;
        artifact.save_tokenizer(&self.tokenizer)?;
        artifact.save_config(&self.export_config())?;

        info!("Saved fine-tuned model to {}", artifact.dir().display());
        Ok(artifact)
    }

    fn export_config(&self) -> serde_json::Value {
        let mut config = self.base_config.clone();
        let (id2label, label2id) = label_maps(&self.labels);
        if let Some(fields) = config.as_object_mut() {
            fields.insert(
                "architectures".to_string(),
                json!(["DistilBertForSequenceClassification"]),
            );
            fields.insert("id2label".to_string(), id2label);
            fields.insert("label2id".to_string(), label2id);
        }
        config
    }
}

/// Copy checkpoint tensors into matching variables
///
/// Names are matched as-is and with the `distilbert.` prefix stripped, so
/// both bare encoder and task-model checkpoints load. Returns the number of
/// variables initialized from the checkpoint.
fn load_pretrained(varmap: &VarMap, weights: &Path, device: &Device) -> Result<usize> {
    if !weights.exists() {
        return Err(Error::model(format!(
            "Base model weights not found: {}",
            weights.display()
        )));
    }

    let tensors = candle_core::safetensors::load(weights, device)
        .map_err(|e| Error::model(format!("Failed to read {}: {}", weights.display(), e)))?;
    let vars = varmap
        .data()
        .lock()
        .map_err(|e| Error::internal(format!("Variable store poisoned: {}", e)))?;

    let mut loaded = 0;
    let mut fresh = Vec::new();
    for (name, var) in vars.iter() {
        let tensor = tensors
            .get(name)
            .or_else(|| name.strip_prefix("distilbert.").and_then(|n| tensors.get(n)));

        let Some(tensor) = tensor else {
            fresh.push(name.as_str());
            continue;
        };

        if tensor.dims() != var.dims() {
            return Err(Error::model(format!(
                "Shape mismatch for {}: checkpoint {:?}, model {:?}",
                name,
                tensor.dims(),
                var.dims()
            )));
        }
        tensor
            .to_dtype(DType::F32)
            .and_then(|t| var.set(&t))
            .map_err(|e| Error::model(format!("Failed to load {}: {}", name, e)))?;
        loaded += 1;
    }

    if loaded == 0 {
        return Err(Error::model(format!(
            "No parameters in {} match a DistilBERT encoder",
            weights.display()
        )));
    }

    fresh.sort_unstable();
    info!(
        "Initialized {} parameters from checkpoint, {} fresh",
        loaded,
        fresh.len()
    );
    debug!("Freshly initialized parameters: {:?}", fresh);
    Ok(loaded)
}
