//! Shuffled mini-batches of tokenized reviews

use crate::dataset::Review;
use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use sentiment_classifiers::EncodedBatch;
use sentiment_core::{Error, Result};
use tokenizers::Tokenizer;

/// Review indices for one epoch, shuffled and chunked
///
/// The last batch is smaller when `len` is not a multiple of `batch_size`.
pub fn shuffled_batches(len: usize, batch_size: usize, rng: &mut StdRng) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(rng);
    indices
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// A tokenized batch with its target classes
#[derive(Debug, Clone)]
pub struct TrainingBatch {
    pub inputs: EncodedBatch,

    /// Class indices, shape `(batch,)`, u32
    pub labels: Tensor,
}

/// Turns reviews into model-ready tensors
pub struct Batcher<'a> {
    tokenizer: &'a Tokenizer,
    device: &'a Device,
    num_labels: usize,
}

impl<'a> Batcher<'a> {
    pub fn new(tokenizer: &'a Tokenizer, device: &'a Device, num_labels: usize) -> Self {
        Self {
            tokenizer,
            device,
            num_labels,
        }
    }

    pub fn batch(&self, reviews: &[&Review]) -> Result<TrainingBatch> {
        let texts: Vec<&str> = reviews.iter().map(|r| r.text.as_str()).collect();
        let labels: Vec<u32> = reviews.iter().map(|r| r.label).collect();

        if let Some(bad) = labels.iter().find(|&&l| l as usize >= self.num_labels) {
            return Err(Error::dataset(format!(
                "Label {} out of range for a {}-class head",
                bad, self.num_labels
            )));
        }

        let inputs = EncodedBatch::encode(self.tokenizer, &texts, self.device)?;
        let labels = Tensor::new(labels.as_slice(), self.device)
            .map_err(|e| Error::internal(format!("Failed to create label tensor: {}", e)))?;

        Ok(TrainingBatch { inputs, labels })
    }
}
