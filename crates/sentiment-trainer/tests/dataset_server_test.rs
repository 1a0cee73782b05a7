//! Datasets-server client against a local mock

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use sentiment_trainer::{load_dataset, DatasetConfig, DatasetServerClient};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct RowsQuery {
    dataset: String,
    config: String,
    split: String,
    offset: usize,
    length: usize,
}

#[derive(Clone)]
struct MockServer {
    total: usize,
    fail: bool,
    truncated_row: Option<usize>,
    requests: Arc<AtomicUsize>,
}

async fn rows(State(server): State<MockServer>, Query(query): Query<RowsQuery>) -> impl IntoResponse {
    server.requests.fetch_add(1, Ordering::SeqCst);
    if server.fail {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "down"})));
    }
    assert_eq!(query.dataset, "stanfordnlp/imdb");
    assert_eq!(query.config, "plain_text");
    assert_eq!(query.split, "train");

    let end = (query.offset + query.length).min(server.total);
    let rows: Vec<_> = (query.offset..end)
        .map(|idx| {
            json!({
                "row_idx": idx,
                "row": { "text": format!("review {idx}"), "label": idx % 2 },
                "truncated_cells": if server.truncated_row == Some(idx) { json!(["text"]) } else { json!([]) }
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "features": [],
            "rows": rows,
            "num_rows_total": server.total,
            "num_rows_per_page": 100,
            "partial": false
        })),
    )
}

async fn spawn_mock(total: usize, fail: bool) -> (String, Arc<AtomicUsize>) {
    spawn_server(total, fail, None).await
}

async fn spawn_server(
    total: usize,
    fail: bool,
    truncated_row: Option<usize>,
) -> (String, Arc<AtomicUsize>) {
    let requests = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route("/rows", get(rows)).with_state(MockServer {
        total,
        fail,
        truncated_row,
        requests: requests.clone(),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), requests)
}

#[tokio::test]
async fn test_fetch_split_pages_through_all_rows() {
    let (url, requests) = spawn_mock(250, false).await;
    let client = DatasetServerClient::new(&url).unwrap();

    let dataset = client.fetch_split(&DatasetConfig::default()).await.unwrap();

    assert_eq!(dataset.len(), 250);
    assert_eq!(requests.load(Ordering::SeqCst), 3);
    assert_eq!(dataset.reviews()[0].text, "review 0");
    assert_eq!(dataset.reviews()[249].text, "review 249");
    assert_eq!(dataset.reviews()[249].label, 1);
    assert_eq!(dataset.label_counts(), vec![125, 125]);
}

#[tokio::test]
async fn test_server_error_is_a_dataset_error() {
    let (url, _) = spawn_mock(10, true).await;
    let client = DatasetServerClient::new(url).unwrap();

    let err = client.fetch_split(&DatasetConfig::default()).await.unwrap_err();
    assert!(matches!(err, sentiment_core::Error::Dataset(_)));
    assert!(err.to_string().contains("500"), "{err}");
}

#[tokio::test]
async fn test_load_dataset_caches_downloads() {
    let cache = tempfile::tempdir().unwrap();
    let (url, requests) = spawn_mock(120, false).await;

    let config = DatasetConfig {
        endpoint: url,
        page_size: 50,
        cache_dir: Some(cache.path().to_path_buf()),
        ..Default::default()
    };

    let first = load_dataset(&config).await.unwrap();
    assert_eq!(first.len(), 120);
    assert_eq!(requests.load(Ordering::SeqCst), 3);

    let offline = DatasetConfig {
        endpoint: "http://127.0.0.1:9".to_string(),
        ..config
    };
    let second = load_dataset(&offline).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_local_file_bypasses_network() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reviews.jsonl");
    std::fs::write(
        &path,
        "{\"text\": \"Loved it\", \"label\": 1}\n{\"text\": \"Hated it\", \"label\": 0}\n",
    )
    .unwrap();

    let config = DatasetConfig {
        file: Some(path),
        endpoint: "http://127.0.0.1:9".to_string(),
        ..Default::default()
    };
    let dataset = load_dataset(&config).await.unwrap();
    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.reviews()[0].label, 1);
}

#[tokio::test]
async fn test_truncated_rows_are_rejected_and_not_cached() {
    let cache = tempfile::tempdir().unwrap();
    let (url, _) = spawn_server(150, false, Some(120)).await;

    let config = DatasetConfig {
        endpoint: url,
        cache_dir: Some(cache.path().to_path_buf()),
        ..Default::default()
    };

    let err = load_dataset(&config).await.unwrap_err();
    assert!(matches!(err, sentiment_core::Error::Dataset(_)));
    assert!(err.to_string().contains("row 120"), "{err}");
    assert!(!sentiment_trainer::cache_path(&config).exists());
}
