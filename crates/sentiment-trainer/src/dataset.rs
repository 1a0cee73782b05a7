//! Labelled review datasets: download, cache and deterministic sampling

use crate::config::DatasetConfig;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sentiment_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// One labelled example; `label` is 0 (negative) or 1 (positive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub text: String,
    pub label: u32,
}

impl Review {
    pub fn new(text: impl Into<String>, label: u32) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// An ordered collection of reviews
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewDataset {
    reviews: Vec<Review>,
}

impl ReviewDataset {
    pub fn new(reviews: Vec<Review>) -> Self {
        Self { reviews }
    }

    pub fn len(&self) -> usize {
        self.reviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn iter(&self) -> impl Iterator<Item = &Review> {
        self.reviews.iter()
    }

    /// Number of reviews per label, indexed by label
    pub fn label_counts(&self) -> Vec<usize> {
        let mut counts = Vec::new();
        for review in &self.reviews {
            let label = review.label as usize;
            if counts.len() <= label {
                counts.resize(label + 1, 0);
            }
            counts[label] += 1;
        }
        counts
    }

    /// Seeded shuffle followed by taking the first `size` reviews
    ///
    /// The same seed and size always select the same subset, in the same order.
    pub fn sample(&self, size: usize, seed: u64) -> Result<Self> {
        if size > self.reviews.len() {
            return Err(Error::dataset(format!(
                "Requested {} samples but the dataset has only {}",
                size,
                self.reviews.len()
            )));
        }

        let mut indices: Vec<usize> = (0..self.reviews.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        Ok(Self {
            reviews: indices[..size]
                .iter()
                .map(|&idx| self.reviews[idx].clone())
                .collect(),
        })
    }

    /// Read one `{"text": ..., "label": ...}` object per line
    pub fn from_jsonl(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            Error::dataset(format!("Failed to open dataset {}: {}", path.display(), e))
        })?;

        let mut reviews = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let review: Review = serde_json::from_str(&line).map_err(|e| {
                Error::dataset(format!(
                    "Invalid review at {}:{}: {}",
                    path.display(),
                    line_no + 1,
                    e
                ))
            })?;
            reviews.push(review);
        }

        debug!("Read {} reviews from {}", reviews.len(), path.display());
        Ok(Self { reviews })
    }

    pub fn write_jsonl(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(std::fs::File::create(path)?);
        for review in &self.reviews {
            serde_json::to_writer(&mut writer, review)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Page of the datasets-server `/rows` endpoint
#[derive(Debug, Deserialize)]
struct RowsPage {
    rows: Vec<RowEntry>,
    num_rows_total: usize,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    row_idx: usize,
    row: Review,
    /// Columns the server shortened to fit its response size limit
    #[serde(default)]
    truncated_cells: Vec<String>,
}

/// Client for the HuggingFace datasets-server rows API
#[derive(Clone)]
pub struct DatasetServerClient {
    http: reqwest::Client,
    base_url: String,
}

impl DatasetServerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::dataset(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_page(
        &self,
        config: &DatasetConfig,
        offset: usize,
        length: usize,
    ) -> Result<RowsPage> {
        let url = format!("{}/rows", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("dataset", config.repo.as_str()),
                ("config", config.config.as_str()),
                ("split", config.split.as_str()),
            ])
            .query(&[("offset", offset), ("length", length)])
            .send()
            .await
            .map_err(|e| Error::dataset(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::dataset(format!(
                "Datasets server returned {} at offset {}: {}",
                status, offset, body
            )));
        }

        response
            .json::<RowsPage>()
            .await
            .map_err(|e| Error::dataset(format!("Invalid rows response at offset {}: {}", offset, e)))
    }

    /// Download every row of the configured split
    pub async fn fetch_split(&self, config: &DatasetConfig) -> Result<ReviewDataset> {
        info!(
            "Downloading {} ({}/{}) from {}",
            config.repo, config.config, config.split, self.base_url
        );

        let mut reviews = Vec::new();
        let mut total = None;
        let mut pages = 0usize;
        while total.map_or(true, |total| reviews.len() < total) {
            let page = self
                .fetch_page(config, reviews.len(), config.page_size)
                .await?;
            if page.rows.is_empty() {
                break;
            }

            total = Some(page.num_rows_total);
            for entry in page.rows {
                if !entry.truncated_cells.is_empty() {
                    return Err(Error::dataset(format!(
                        "Datasets server truncated {:?} of row {}; use a smaller page_size or a local dataset file",
                        entry.truncated_cells, entry.row_idx
                    )));
                }
                reviews.push(entry.row);
            }

            pages += 1;
            if pages % 50 == 0 {
                info!("Fetched {}/{} rows", reviews.len(), page.num_rows_total);
            }
        }

        if let Some(total) = total {
            if reviews.len() < total {
                return Err(Error::dataset(format!(
                    "Datasets server stopped after {} of {} rows",
                    reviews.len(),
                    total
                )));
            }
        }

        Ok(ReviewDataset::new(reviews))
    }
}

/// JSON-lines cache location for a hub split
pub fn cache_path(config: &DatasetConfig) -> PathBuf {
    let root = config.cache_dir.clone().unwrap_or_else(|| {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("sentiment")
            .join("datasets")
    });
    root.join(config.repo.replace('/', "__"))
        .join(&config.config)
        .join(format!("{}.jsonl", config.split))
}

/// Load the configured split from a local file, the cache, or the network
pub async fn load_dataset(config: &DatasetConfig) -> Result<ReviewDataset> {
    if let Some(file) = &config.file {
        info!("Loading reviews from {}", file.display());
        return ReviewDataset::from_jsonl(file);
    }

    let cached = cache_path(config);
    if cached.exists() {
        info!("Loading cached reviews from {}", cached.display());
        return ReviewDataset::from_jsonl(&cached);
    }

    let dataset = DatasetServerClient::new(&config.endpoint)?
        .fetch_split(config)
        .await?;
    dataset.write_jsonl(&cached)?;
    info!("Cached {} reviews at {}", dataset.len(), cached.display());

    Ok(dataset)
}
