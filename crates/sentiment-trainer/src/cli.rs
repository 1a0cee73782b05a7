//! Command-line interface

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "sentiment-trainer")]
#[command(about = "Fine-tune DistilBERT on IMDB reviews for binary sentiment", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "train.yaml")]
    pub config: String,

    /// Read reviews from a local JSON-lines file instead of the hub
    #[arg(long)]
    pub dataset_file: Option<PathBuf>,

    /// Where to write the fine-tuned model
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Number of passes over the sample
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Reviews per optimizer step
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Number of reviews drawn from the split
    #[arg(short = 'n', long)]
    pub sample_size: Option<usize>,

    /// Seed for sampling and batch shuffling
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
