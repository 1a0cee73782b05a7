//! Server configuration

use crate::cli::Cli;
use sentiment_classifiers::{InferenceOptions, ModelSource, DEFAULT_MODEL_DIR};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Baseline model served by `/predict/naive`
pub const NAIVE_MODEL_REPO: &str = "distilbert-base-uncased-finetuned-sst-2-english";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for both listeners
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Prediction API port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Prometheus scrape port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Models backing the two endpoints
    #[serde(default)]
    pub models: ModelsConfig,

    /// Tokenizer and device options
    #[serde(default)]
    pub inference: InferenceOptions,

    /// Maximum concurrent inference calls
    #[serde(default = "default_workers")]
    pub inference_workers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_naive_model")]
    pub naive: ModelSource,

    #[serde(default = "default_trained_model")]
    pub trained: ModelSource,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            naive: default_naive_model(),
            trained: default_trained_model(),
        }
    }
}

impl ServerConfig {
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
        if let Some(listen) = &cli.listen {
            config.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            config.port = port;
        }

        if let Some(metrics_port) = cli.metrics_port {
            config.metrics_port = metrics_port;
        }

        if let Some(model_dir) = &cli.model_dir {
            config.models.trained = ModelSource::local(model_dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.inference_workers == 0 {
            anyhow::bail!("inference_workers must be at least 1");
        }
        if self.inference.max_length == 0 {
            anyhow::bail!("inference.max_length must be at least 1");
        }
        if self.port == self.metrics_port {
            anyhow::bail!("port and metrics_port must differ (both {})", self.port);
        }
        Ok(())
    }

    pub fn api_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.listen, self.port).parse()?)
    }

    pub fn metrics_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.listen, self.metrics_port).parse()?)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            metrics_port: default_metrics_port(),
            models: ModelsConfig::default(),
            inference: InferenceOptions::default(),
            inference_workers: default_workers(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_metrics_port() -> u16 {
    8001
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_naive_model() -> ModelSource {
    ModelSource::hub(NAIVE_MODEL_REPO)
}

fn default_trained_model() -> ModelSource {
    ModelSource::local(DEFAULT_MODEL_DIR)
}
