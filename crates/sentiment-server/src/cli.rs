//! Command-line interface

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "sentiment-server")]
#[command(about = "Sentiment prediction API with Prometheus metrics", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "server.yaml")]
    pub config: String,

    /// Listen address
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// API port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Prometheus metrics port
    #[arg(short = 'm', long)]
    pub metrics_port: Option<u16>,

    /// Directory holding the fine-tuned model
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
