//! Request and response types for sentiment prediction

use serde::{Deserialize, Serialize};

/// Body of a prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextInput {
    /// Text to classify
    pub text: String,
}

/// Body of a prediction response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentOutput {
    /// Echo of the input text
    pub text: String,

    /// Label emitted by the model head (e.g. `LABEL_1`, `POSITIVE`)
    pub sentiment: String,

    /// Confidence of `sentiment` (0.0-1.0)
    pub score: f32,
}

impl SentimentOutput {
    /// Build a response for `text` from a predicted label and score
    pub fn new(text: impl Into<String>, sentiment: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            sentiment: sentiment.into(),
            score,
        }
    }
}
