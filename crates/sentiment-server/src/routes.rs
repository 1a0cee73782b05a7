//! HTTP routes and handlers

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sentiment_core::{SentimentOutput, TextInput};
use sentiment_telemetry::PredictionMetrics;
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::inference;
use crate::state::{AppState, ModelVariant};

/// Prediction API served on the main listener
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/predict/naive", post(predict_naive))
        .route("/predict/trained", post(predict_trained))
        .fallback(fallback)
        // Inputs of any size reach the tokenizer, which truncates them
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Prometheus scrape endpoint served on its own listener
pub fn metrics_router(metrics: PredictionMetrics) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics)
}

/// Periodically drain buffered histogram samples until `stop` resolves
pub fn spawn_metrics_upkeep(
    metrics: PredictionMetrics,
    interval: Duration,
    stop: impl Future<Output = ()> + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(stop);
        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => metrics.run_upkeep(),
            }
        }
        debug!("Metrics upkeep stopped");
    })
}

async fn health_check() -> &'static str {
    "OK"
}

async fn render_metrics(State(metrics): State<PredictionMetrics>) -> Response {
    (
        [("content-type", "text/plain; version=0.0.4")],
        metrics.render(),
    )
        .into_response()
}

async fn predict_naive(
    State(state): State<AppState>,
    Json(input): Json<TextInput>,
) -> Result<Json<SentimentOutput>, AppError> {
    predict(&state, ModelVariant::Naive, input).await
}

async fn predict_trained(
    State(state): State<AppState>,
    Json(input): Json<TextInput>,
) -> Result<Json<SentimentOutput>, AppError> {
    predict(&state, ModelVariant::Trained, input).await
}

async fn predict(
    state: &AppState,
    variant: ModelVariant,
    input: TextInput,
) -> Result<Json<SentimentOutput>, AppError> {
    debug!("Received {} prediction request ({} bytes)", variant, input.text.len());

    let result = inference::predict(
        &state.pool,
        &state.metrics,
        state.classifier(variant),
        input.text.clone(),
    )
    .await
    .map_err(|e| {
        error!("{} prediction failed: {}", variant, e);
        AppError::Inference(e.to_string())
    })?;

    debug!(
        "{} prediction: {} ({:.4}) in {}us",
        variant, result.label, result.score, result.latency_us
    );
    Ok(Json(SentimentOutput::new(input.text, result.label, result.score)))
}

async fn fallback() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": {
                "message": "Not found",
                "type": "invalid_request_error",
            }
        })),
    )
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Inference(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, kind) = match self {
            AppError::Inference(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, "inference_error"),
        };

        let body = json!({
            "error": {
                "message": message,
                "type": kind,
            }
        });

        (status, Json(body)).into_response()
    }
}
