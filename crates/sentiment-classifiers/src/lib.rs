//! Sentiment Classifiers
//!
//! Candle-backed DistilBERT sentiment classifiers and the on-disk model
//! artifact format shared by the trainer and the prediction server.
//!
//! Classifiers are synchronous and CPU-bound. The server runs them on a
//! bounded blocking pool; the trainer drives the same network directly.

pub mod classifier;
pub mod distilbert;
pub mod encoding;
pub mod model_store;
pub mod sequence;

pub use classifier::{ClassificationResult, Classifier};
pub use distilbert::{Activation, DistilBertConfig, DistilBertForSequenceClassification};
pub use encoding::{prepare_tokenizer, EncodedBatch, DEFAULT_MAX_LENGTH};
pub use model_store::{
    default_labels, device_from_str, label_maps, labels_from_config, ModelArtifact, ModelSource,
    DEFAULT_MODEL_DIR,
};
pub use sequence::{InferenceOptions, SequenceClassifier};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{ClassificationResult, Classifier};
    pub use crate::model_store::{ModelArtifact, ModelSource};
    pub use crate::sequence::{InferenceOptions, SequenceClassifier};
}
