//! Post-training sanity check on hand-written reviews

use crate::trainer::Trainer;
use sentiment_core::Result;
use std::fmt;

pub const SMOKE_SENTENCES: [&str; 10] = [
    "Absolutely loved every minute of it!",
    "One of the worst movies I've ever seen.",
    "It had its moments, but overall it fell flat.",
    "Incredible visuals and a powerful story.",
    "I regret wasting my time on this.",
    "A truly unforgettable performance by the lead actor.",
    "Nothing special, just another average film.",
    "The plot was weak and the pacing was off.",
    "Heartwarming, funny, and full of charm.",
    "I couldnt stay awake — it was that boring.",
];

/// Predicted class for one smoke-test sentence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokePrediction {
    pub sentence: String,
    /// Class index; 1 is positive
    pub class: usize,
}

impl SmokePrediction {
    pub fn sentiment(&self) -> &'static str {
        if self.class == 1 {
            "positive"
        } else {
            "negative"
        }
    }
}

impl fmt::Display for SmokePrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Input: \"{}\" -> Predicted sentiment: {}",
            self.sentence,
            self.sentiment()
        )
    }
}

/// Classify [`SMOKE_SENTENCES`] with the trained model
pub fn run_smoke_test(trainer: &Trainer) -> Result<Vec<SmokePrediction>> {
    let classes = trainer.predict(&SMOKE_SENTENCES)?;
    Ok(SMOKE_SENTENCES
        .iter()
        .zip(classes)
        .map(|(sentence, class)| SmokePrediction {
            sentence: sentence.to_string(),
            class,
        })
        .collect())
}
