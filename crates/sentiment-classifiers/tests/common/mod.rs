//! Tiny on-disk model fixtures

#![allow(dead_code)]

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use sentiment_classifiers::{
    label_maps, DistilBertConfig, DistilBertForSequenceClassification, ModelArtifact,
};
use serde_json::json;
use std::path::Path;

pub const VOCAB: &str = "[PAD]\n[UNK]\n[CLS]\n[SEP]\nthis\nis\namazing\nterrible\n!\nmovie\ngreat\nawful\nloved\nhated\nit\nthe\n.\n";

pub fn tiny_config(labels: Option<&[&str]>) -> serde_json::Value {
    let mut config = json!({
        "model_type": "distilbert",
        "vocab_size": 17,
        "dim": 8,
        "n_layers": 1,
        "n_heads": 2,
        "hidden_dim": 16,
        "max_position_embeddings": 32,
        "activation": "gelu",
    });
    if let Some(labels) = labels {
        let labels: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        let (id2label, label2id) = label_maps(&labels);
        config["id2label"] = id2label;
        config["label2id"] = label2id;
    }
    config
}

/// Write a randomly initialised two-class model to `dir`
pub fn write_tiny_model(dir: &Path, labels: Option<&[&str]>) -> ModelArtifact {
    let artifact = ModelArtifact::create(dir).unwrap();
    let config_json = tiny_config(labels);
    artifact.save_config(&config_json).unwrap();
    std::fs::write(dir.join("vocab.txt"), VOCAB).unwrap();

    let config: DistilBertConfig = serde_json::from_value(config_json).unwrap();
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    DistilBertForSequenceClassification::load(vb, &config, 2).unwrap();
    artifact.save_weights(&varmap).unwrap();

    artifact
}
