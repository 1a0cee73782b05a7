//! Sentiment Core
//!
//! Types shared across the sentiment service components:
//! - Error type and result alias
//! - Prediction request/response bodies

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{SentimentOutput, TextInput};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{SentimentOutput, TextInput};
}
