//! Sentiment Trainer
//!
//! Fine-tunes a pretrained DistilBERT encoder for binary sentiment on a
//! seeded sample of IMDB reviews and writes a model artifact the server can
//! load directly.

pub mod batcher;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod smoke;
pub mod trainer;

pub use cli::Cli;
pub use config::{DatasetConfig, TrainConfig};
pub use dataset::{cache_path, load_dataset, DatasetServerClient, Review, ReviewDataset};
pub use smoke::{run_smoke_test, SmokePrediction, SMOKE_SENTENCES};
pub use trainer::{EpochStats, Trainer, TrainingReport};

use sentiment_classifiers::ModelArtifact;
use sentiment_core::Result;

/// Everything a finished run produced
#[derive(Debug)]
pub struct TrainingOutcome {
    pub report: TrainingReport,
    pub artifact: ModelArtifact,
    pub smoke: Vec<SmokePrediction>,
}

/// Sample, train, save and smoke-test in one call
///
/// `on_epoch` receives each epoch summary as soon as it completes.
pub fn fine_tune(
    config: &TrainConfig,
    dataset: &ReviewDataset,
    on_epoch: impl FnMut(&EpochStats),
) -> Result<TrainingOutcome> {
    let sample = dataset.sample(config.sample_size, config.seed)?;
    let counts = sample.label_counts();
    tracing::info!("Sampled {} reviews (label counts {:?})", sample.len(), counts);

    let trainer = Trainer::from_config(config)?;
    let report = trainer.train(&sample, on_epoch)?;
    let artifact = trainer.save(&config.output_dir)?;
    let smoke = run_smoke_test(&trainer)?;

    Ok(TrainingOutcome {
        report,
        artifact,
        smoke,
    })
}
