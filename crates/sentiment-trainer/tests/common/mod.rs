//! Tiny base models and review files for trainer tests

#![allow(dead_code)]

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use sentiment_classifiers::{DistilBertConfig, DistilBertForSequenceClassification, ModelArtifact};
use sentiment_trainer::{Review, ReviewDataset};
use std::collections::HashMap;
use std::path::Path;

pub const VOCAB: &str = "[PAD]\n[UNK]\n[CLS]\n[SEP]\namazing\nterrible\nloved\nhated\nit\nmovie\nthis\nis\n!\n.\n";

pub fn tiny_config() -> serde_json::Value {
    serde_json::json!({
        "model_type": "distilbert",
        "vocab_size": 14,
        "dim": 8,
        "n_layers": 1,
        "n_heads": 2,
        "hidden_dim": 16,
        "max_position_embeddings": 32,
        "activation": "gelu",
    })
}

/// Write a random encoder checkpoint without the task head
///
/// Parameter names carry no `distilbert.` prefix, like a bare encoder export.
pub fn write_base_model(dir: &Path) -> ModelArtifact {
    let artifact = ModelArtifact::create(dir).unwrap();
    artifact.save_config(&tiny_config()).unwrap();
    std::fs::write(dir.join("vocab.txt"), VOCAB).unwrap();

    let config: DistilBertConfig = serde_json::from_value(tiny_config()).unwrap();
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    DistilBertForSequenceClassification::load(vb, &config, 2).unwrap();

    let encoder: HashMap<String, Tensor> = varmap
        .data()
        .lock()
        .unwrap()
        .iter()
        .filter_map(|(name, var)| {
            name.strip_prefix("distilbert.")
                .map(|n| (n.to_string(), var.as_tensor().clone()))
        })
        .collect();
    candle_core::safetensors::save(&encoder, artifact.weights_path()).unwrap();

    artifact
}

/// Trivially separable reviews, `copies` of each
pub fn toy_reviews(copies: usize) -> ReviewDataset {
    let mut reviews = Vec::new();
    for _ in 0..copies {
        reviews.push(Review::new("amazing movie !", 1));
        reviews.push(Review::new("loved it .", 1));
        reviews.push(Review::new("terrible movie !", 0));
        reviews.push(Review::new("hated it .", 0));
    }
    ReviewDataset::new(reviews)
}
