//! Sentiment Server
//!
//! HTTP prediction API over two preloaded classifiers (an off-the-shelf
//! baseline and a locally fine-tuned model), with Prometheus metrics served
//! on a separate listener.

pub mod cli;
pub mod config;
pub mod inference;
pub mod routes;
pub mod state;
pub mod shutdown;

pub use cli::Cli;
pub use config::ServerConfig;
pub use inference::InferencePool;
pub use routes::{create_router, metrics_router, spawn_metrics_upkeep};
pub use state::{AppState, ModelVariant};
