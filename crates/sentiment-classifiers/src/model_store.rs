//! Model artifact directories: resolution, loading and persistence
//!
//! A model artifact is a directory holding `config.json`, `tokenizer.json`
//! (or a BERT `vocab.txt`) and `model.safetensors`. The trainer writes one to
//! `./model/`; the server reads it back alongside the hub baseline model.

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use hf_hub::{api::sync::Api, Repo, RepoType};
use sentiment_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

/// Directory shared between the trainer (writer) and the server (reader)
pub const DEFAULT_MODEL_DIR: &str = "./model";

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const VOCAB_FILE: &str = "vocab.txt";
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Where a model artifact comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSource {
    /// Artifact directory on the local filesystem
    Local { path: PathBuf },

    /// Model repository on the HuggingFace Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
    },
}

fn default_revision() -> String {
    "main".to_string()
}

impl ModelSource {
    /// Local artifact directory
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local { path: path.into() }
    }

    /// HuggingFace Hub repository at `main`
    pub fn hub(repo: impl Into<String>) -> Self {
        Self::HuggingFace {
            repo: repo.into(),
            revision: default_revision(),
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { path } => write!(f, "{}", path.display()),
            Self::HuggingFace { repo, revision } => write!(f, "hf://{}@{}", repo, revision),
        }
    }
}

/// A resolved model artifact directory
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    dir: PathBuf,
}

impl ModelArtifact {
    /// Resolve a source to a directory, downloading hub models if needed
    pub fn resolve(source: &ModelSource) -> Result<Self> {
        match source {
            ModelSource::Local { path } => Self::open(path),
            ModelSource::HuggingFace { repo, revision } => download_from_huggingface(repo, revision),
        }
    }

    /// Open an existing artifact directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::model(format!(
                "Model path does not exist: {}",
                dir.display()
            )));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Create (or reuse) an artifact directory for writing
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(WEIGHTS_FILE)
    }

    /// Read `config.json` as raw JSON
    pub fn read_config(&self) -> Result<serde_json::Value> {
        self.parse_config()
    }

    /// Read `config.json` into a typed configuration
    pub fn parse_config<T: DeserializeOwned>(&self) -> Result<T> {
        let path = self.config_path();
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            Error::model(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::model(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    /// Label names in head order
    pub fn labels(&self) -> Result<Vec<String>> {
        Ok(labels_from_config(&self.read_config()?))
    }

    /// Load the tokenizer, preferring `tokenizer.json` over `vocab.txt`
    pub fn load_tokenizer(&self) -> Result<Tokenizer> {
        let tokenizer_path = self.tokenizer_path();
        if tokenizer_path.exists() {
            tracing::debug!("Loading tokenizer from {}", tokenizer_path.display());
            return Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| Error::model(format!("Failed to load tokenizer.json: {}", e)));
        }

        let vocab_path = self.dir.join(VOCAB_FILE);
        if vocab_path.exists() {
            tracing::debug!("Building WordPiece tokenizer from {}", vocab_path.display());
            return wordpiece_tokenizer(&vocab_path);
        }

        Err(Error::model(format!(
            "No tokenizer found in {} (tried {}, {})",
            self.dir.display(),
            TOKENIZER_FILE,
            VOCAB_FILE
        )))
    }

    /// Memory-map `model.safetensors` into a VarBuilder
    pub fn var_builder(&self, device: &Device) -> Result<VarBuilder<'static>> {
        let weights_path = self.weights_path();
        if !weights_path.exists() {
            return Err(Error::model(format!(
                "{} not found in {}",
                WEIGHTS_FILE,
                self.dir.display()
            )));
        }

        // SAFETY: the artifact is immutable for the lifetime of the process.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
                .map_err(|e| Error::model(format!("Failed to load weights: {}", e)))?
        };
        Ok(vb)
    }

    pub fn save_config(&self, config: &serde_json::Value) -> Result<()> {
        let contents = serde_json::to_string_pretty(config)?;
        std::fs::write(self.config_path(), contents)?;
        Ok(())
    }

    pub fn save_tokenizer(&self, tokenizer: &Tokenizer) -> Result<()> {
        tokenizer
            .save(self.tokenizer_path(), true)
            .map_err(|e| Error::model(format!("Failed to save tokenizer: {}", e)))
    }

    pub fn save_weights(&self, varmap: &VarMap) -> Result<()> {
        varmap
            .save(self.weights_path())
            .map_err(|e| Error::model(format!("Failed to save weights: {}", e)))
    }

    /// Check that config, tokenizer and weights are all present
    pub fn is_complete(&self) -> bool {
        self.config_path().exists()
            && self.weights_path().exists()
            && (self.tokenizer_path().exists() || self.dir.join(VOCAB_FILE).exists())
    }
}

/// Download a model repository from the HuggingFace Hub
fn download_from_huggingface(repo: &str, revision: &str) -> Result<ModelArtifact> {
    tracing::info!("Downloading model from HuggingFace: {} @ {}", repo, revision);

    let api = Api::new()
        .map_err(|e| Error::model(format!("Failed to initialize HuggingFace API: {}", e)))?;
    let repo_obj = api.repo(Repo::with_revision(
        repo.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    let config_path = repo_obj
        .get(CONFIG_FILE)
        .map_err(|e| Error::model(format!("Failed to download {}: {}", CONFIG_FILE, e)))?;
    repo_obj
        .get(WEIGHTS_FILE)
        .map_err(|e| Error::model(format!("Failed to download {}: {}", WEIGHTS_FILE, e)))?;

    let found_tokenizer = [TOKENIZER_FILE, VOCAB_FILE].iter().any(|file| match repo_obj.get(file) {
        Ok(_) => {
            tracing::debug!("Found tokenizer file: {}", file);
            true
        }
        Err(e) => {
            tracing::debug!("Tokenizer file {} unavailable: {}", file, e);
            false
        }
    });
    if !found_tokenizer {
        return Err(Error::model(format!(
            "No tokenizer found in {} (tried {}, {})",
            repo, TOKENIZER_FILE, VOCAB_FILE
        )));
    }

    let model_dir = config_path
        .parent()
        .ok_or_else(|| Error::model("Invalid cache path"))?;

    tracing::info!("Model available at: {}", model_dir.display());
    ModelArtifact::open(model_dir)
}

/// Build a lowercase BERT WordPiece tokenizer from a vocabulary file
fn wordpiece_tokenizer(vocab_path: &Path) -> Result<Tokenizer> {
    use tokenizers::models::wordpiece::WordPiece;
    use tokenizers::normalizers::BertNormalizer;
    use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
    use tokenizers::processors::bert::BertProcessing;
    use tokenizers::Model;

    let wordpiece = WordPiece::from_file(vocab_path.to_string_lossy().as_ref())
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(|e| Error::model(format!("Failed to build WordPiece model: {}", e)))?;

    let vocab = wordpiece.get_vocab();
    let special = |token: &str| {
        vocab
            .get(token)
            .map(|id| (token.to_string(), *id))
            .ok_or_else(|| Error::model(format!("{} has no {} token", VOCAB_FILE, token)))
    };
    let sep = special("[SEP]")?;
    let cls = special("[CLS]")?;

    let mut tokenizer = Tokenizer::new(wordpiece);
    tokenizer.with_normalizer(Some(BertNormalizer::default()));
    tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
    tokenizer.with_post_processor(Some(BertProcessing::new(sep, cls)));

    Ok(tokenizer)
}

/// Label names from a model config's `id2label`, ordered by class index
///
/// Falls back to `LABEL_{i}` for `num_labels` classes (two when absent).
pub fn labels_from_config(config: &serde_json::Value) -> Vec<String> {
    if let Some(id2label) = config.get("id2label").and_then(|v| v.as_object()) {
        let mut entries: Vec<(usize, String)> = id2label
            .iter()
            .filter_map(|(idx, label)| Some((idx.parse().ok()?, label.as_str()?.to_string())))
            .collect();
        entries.sort_by_key(|(idx, _)| *idx);

        if !entries.is_empty() {
            return entries.into_iter().map(|(_, label)| label).collect();
        }
    }

    let num_labels = config
        .get("num_labels")
        .and_then(|v| v.as_u64())
        .unwrap_or(2) as usize;
    default_labels(num_labels)
}

/// Generic `LABEL_{i}` names, as emitted by heads trained without a label map
pub fn default_labels(num_labels: usize) -> Vec<String> {
    (0..num_labels).map(|idx| format!("LABEL_{}", idx)).collect()
}

/// `id2label`/`label2id` entries for writing into `config.json`
pub fn label_maps(labels: &[String]) -> (serde_json::Value, serde_json::Value) {
    let id2label = labels
        .iter()
        .enumerate()
        .map(|(idx, label)| (idx.to_string(), serde_json::Value::from(label.clone())))
        .collect::<serde_json::Map<_, _>>();
    let label2id = labels
        .iter()
        .enumerate()
        .map(|(idx, label)| (label.clone(), serde_json::Value::from(idx)))
        .collect::<serde_json::Map<_, _>>();
    (id2label.into(), label2id.into())
}

/// Create a Candle device from its name (`cpu`, `cuda`, `metal`)
pub fn device_from_str(device: &str) -> Result<Device> {
    match device.to_lowercase().as_str() {
        "cuda" | "cuda:0" => Device::new_cuda(0)
            .map_err(|e| Error::config(format!("Failed to initialize CUDA: {}", e))),
        "mps" | "metal" => Device::new_metal(0)
            .map_err(|e| Error::config(format!("Failed to initialize Metal: {}", e))),
        "cpu" => Ok(Device::Cpu),
        other => Err(Error::config(format!("Unknown device: {}", other))),
    }
}
