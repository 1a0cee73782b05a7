//! Training configuration

use crate::cli::Cli;
use sentiment_classifiers::{ModelSource, DEFAULT_MAX_LENGTH, DEFAULT_MODEL_DIR};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Pretrained encoder the classification head is trained on top of
pub const BASE_MODEL_REPO: &str = "distilbert-base-uncased";

pub const DATASET_REPO: &str = "stanfordnlp/imdb";
pub const DATASET_ENDPOINT: &str = "https://datasets-server.huggingface.co";

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default = "default_base_model")]
    pub base_model: ModelSource,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Reviews are truncated to this many tokens
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    #[serde(default = "default_device")]
    pub device: String,
}

/// Where labelled reviews come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_repo")]
    pub repo: String,

    /// Dataset configuration name
    #[serde(default = "default_dataset_config")]
    pub config: String,

    #[serde(default = "default_split")]
    pub split: String,

    /// Local JSON-lines file; bypasses the network when set
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Base URL of the datasets-server rows API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Rows requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Overrides the user cache directory
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            repo: default_dataset_repo(),
            config: default_dataset_config(),
            split: default_split(),
            file: None,
            endpoint: default_endpoint(),
            page_size: default_page_size(),
            cache_dir: None,
        }
    }
}

impl TrainConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        // Apply CLI overrides
        if let Some(file) = &cli.dataset_file {
            config.dataset.file = Some(file.clone());
        }
        if let Some(output_dir) = &cli.output_dir {
            config.output_dir = output_dir.clone();
        }
        if let Some(epochs) = cli.epochs {
            config.epochs = epochs;
        }
        if let Some(batch_size) = cli.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(sample_size) = cli.sample_size {
            config.sample_size = sample_size;
        }
        if let Some(seed) = cli.seed {
            config.seed = seed;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.epochs == 0 {
            anyhow::bail!("epochs must be at least 1");
        }
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be at least 1");
        }
        if self.sample_size == 0 {
            anyhow::bail!("sample_size must be at least 1");
        }
        if self.max_length < 2 {
            anyhow::bail!("max_length must leave room for [CLS] and [SEP]");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            anyhow::bail!("learning_rate must be positive, got {}", self.learning_rate);
        }
        if self.dataset.page_size == 0 || self.dataset.page_size > 100 {
            anyhow::bail!("dataset.page_size must be between 1 and 100");
        }
        Ok(())
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            base_model: default_base_model(),
            output_dir: default_output_dir(),
            sample_size: default_sample_size(),
            seed: default_seed(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            max_length: default_max_length(),
            device: default_device(),
        }
    }
}

fn default_base_model() -> ModelSource {
    ModelSource::hub(BASE_MODEL_REPO)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_DIR)
}

fn default_sample_size() -> usize {
    3000
}

fn default_seed() -> u64 {
    42
}

fn default_epochs() -> usize {
    3
}

fn default_batch_size() -> usize {
    8
}

fn default_learning_rate() -> f64 {
    2e-5
}

fn default_max_length() -> usize {
    DEFAULT_MAX_LENGTH
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_dataset_repo() -> String {
    DATASET_REPO.to_string()
}

fn default_dataset_config() -> String {
    "plain_text".to_string()
}

fn default_split() -> String {
    "train".to_string()
}

fn default_endpoint() -> String {
    DATASET_ENDPOINT.to_string()
}

fn default_page_size() -> usize {
    100
}
