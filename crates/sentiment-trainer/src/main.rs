//! Sentiment Trainer
//!
//! Fine-tunes DistilBERT on IMDB and writes the result to `./model/`.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use sentiment_trainer::{fine_tune, load_dataset, Cli, TrainConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    let config = TrainConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("Base model: {}", config.base_model);
    info!("Output: {}", config.output_dir.display());

    let dataset = load_dataset(&config.dataset)
        .await
        .context("Failed to load training data")?;
    info!("Loaded {} reviews", dataset.len());

    let outcome = tokio::task::spawn_blocking(move || {
        fine_tune(&config, &dataset, |stats| println!("{}", stats))
    })
    .await
    .context("Training task panicked")?
    .context("Training failed")?;

    for prediction in &outcome.smoke {
        println!("{}", prediction);
    }

    info!(
        "Training complete: {} samples, final loss {:.4}, model at {}",
        outcome.report.samples,
        outcome.report.final_loss().unwrap_or(f64::NAN),
        outcome.artifact.dir().display()
    );
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("sentiment=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sentiment=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
