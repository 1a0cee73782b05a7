//! Classifier trait and common types

use sentiment_core::Result;

/// Trait for all sentiment classifiers
///
/// Inference is CPU-bound and synchronous; callers that live on an async
/// runtime are expected to move calls onto a blocking thread.
pub trait Classifier: Send + Sync {
    /// Classify a single text
    fn classify(&self, text: &str) -> Result<ClassificationResult>;

    /// Get the classifier name
    fn name(&self) -> &str;
}

/// Result of classification
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    /// Predicted label (argmax of the model head)
    pub label: String,

    /// Probability of `label` (0.0-1.0)
    pub score: f32,

    /// Probability of every label, in head order
    pub all_scores: Vec<(String, f32)>,

    /// Latency in microseconds
    pub latency_us: u64,
}

impl ClassificationResult {
    /// Create a new classification result
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
            all_scores: Vec::new(),
            latency_us: 0,
        }
    }

    /// Build a result from one row of class probabilities
    ///
    /// Picks the most probable label; ties resolve to the lowest index.
    pub fn from_probabilities(labels: &[String], probs: &[f32], latency_us: u64) -> Self {
        let (best_idx, best_prob) = probs
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |best, (idx, p)| if p > best.1 { (idx, p) } else { best });

        let label = labels
            .get(best_idx)
            .cloned()
            .unwrap_or_else(|| format!("LABEL_{}", best_idx));

        let all_scores = probs
            .iter()
            .enumerate()
            .map(|(idx, p)| {
                let name = labels
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| format!("LABEL_{}", idx));
                (name, *p)
            })
            .collect();

        Self {
            label,
            score: best_prob.clamp(0.0, 1.0),
            all_scores,
            latency_us,
        }
    }
}
