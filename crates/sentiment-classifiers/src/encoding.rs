//! Tokenization into model-ready tensors

use candle_core::{Device, Tensor};
use sentiment_core::{Error, Result};
use tokenizers::{
    Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationDirection, TruncationParams,
};

/// Default maximum sequence length (DistilBERT position table size)
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// Configure a tokenizer for batched inference and training
///
/// Pads to the longest sequence in the batch and truncates on the right at
/// `max_length` tokens, overriding whatever the tokenizer file specifies.
pub fn prepare_tokenizer(mut tokenizer: Tokenizer, max_length: usize) -> Result<Tokenizer> {
    let (pad_token, pad_id) = ["[PAD]", "<pad>"]
        .iter()
        .find_map(|token| tokenizer.token_to_id(token).map(|id| (token.to_string(), id)))
        .unwrap_or_else(|| ("[PAD]".to_string(), 0));

    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        pad_id,
        pad_token,
        ..Default::default()
    }));
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            direction: TruncationDirection::Right,
            ..Default::default()
        }))
        .map_err(|e| Error::model(format!("Failed to configure truncation: {}", e)))?;

    Ok(tokenizer)
}

/// A tokenized batch
#[derive(Debug, Clone)]
pub struct EncodedBatch {
    /// Token ids, shape `(batch, seq_len)`, u32
    pub input_ids: Tensor,

    /// Padding mask, shape `(batch, 1, 1, seq_len)`, u8; 1 marks padding
    pub padding_mask: Tensor,
}

impl EncodedBatch {
    /// Tokenize `texts` with a tokenizer from [`prepare_tokenizer`]
    pub fn encode(tokenizer: &Tokenizer, texts: &[&str], device: &Device) -> Result<Self> {
        let encodings = tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::classifier(format!("Tokenization failed: {}", e)))?;
        Self::from_encodings(&encodings, device)
    }

    /// Stack equal-length encodings into tensors
    pub fn from_encodings(encodings: &[Encoding], device: &Device) -> Result<Self> {
        let first = encodings
            .first()
            .ok_or_else(|| Error::classifier("Cannot encode an empty batch"))?;
        let batch = encodings.len();
        let seq_len = first.get_ids().len();

        let mut ids = Vec::with_capacity(batch * seq_len);
        let mut padding = Vec::with_capacity(batch * seq_len);
        for encoding in encodings {
            if encoding.get_ids().len() != seq_len {
                return Err(Error::classifier(format!(
                    "Ragged batch: expected {} tokens, got {}",
                    seq_len,
                    encoding.get_ids().len()
                )));
            }
            ids.extend_from_slice(encoding.get_ids());
            padding.extend(
                encoding
                    .get_attention_mask()
                    .iter()
                    .map(|&attend| u8::from(attend == 0)),
            );
        }

        let input_ids = Tensor::from_vec(ids, (batch, seq_len), device)
            .map_err(|e| Error::classifier(format!("Failed to create input tensor: {}", e)))?;
        let padding_mask = Tensor::from_vec(padding, (batch, 1, 1, seq_len), device)
            .map_err(|e| Error::classifier(format!("Failed to create padding mask: {}", e)))?;

        Ok(Self {
            input_ids,
            padding_mask,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.input_ids.dims().first().copied().unwrap_or(0)
    }

    pub fn seq_len(&self) -> usize {
        self.input_ids.dims().get(1).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_store::ModelArtifact;

    fn tiny_tokenizer(max_length: usize) -> (tempfile::TempDir, Tokenizer) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("vocab.txt"),
            "[PAD]\n[UNK]\n[CLS]\n[SEP]\nthis\nis\namazing\nterrible\n!\n",
        )
        .unwrap();
        let tokenizer = ModelArtifact::open(dir.path())
            .unwrap()
            .load_tokenizer()
            .unwrap();
        (dir, prepare_tokenizer(tokenizer, max_length).unwrap())
    }

    #[test]
    fn test_batch_pads_to_longest() {
        let (_dir, tokenizer) = tiny_tokenizer(16);
        let batch =
            EncodedBatch::encode(&tokenizer, &["amazing", "this is terrible !"], &Device::Cpu)
                .unwrap();

        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.seq_len(), 6);

        let ids = batch.input_ids.to_vec2::<u32>().unwrap();
        assert_eq!(ids[0], vec![2, 6, 3, 0, 0, 0]);
        assert_eq!(ids[1], vec![2, 4, 5, 7, 8, 3]);

        let mask = batch
            .padding_mask
            .flatten_all()
            .unwrap()
            .to_vec1::<u8>()
            .unwrap();
        assert_eq!(&mask[..6], &[0, 0, 0, 1, 1, 1]);
        assert_eq!(&mask[6..], &[0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_long_input_is_truncated() {
        let (_dir, tokenizer) = tiny_tokenizer(8);
        let text = "this is amazing ".repeat(50);
        let batch = EncodedBatch::encode(&tokenizer, &[text.as_str()], &Device::Cpu).unwrap();

        assert_eq!(batch.seq_len(), 8);
        let ids = batch.input_ids.to_vec2::<u32>().unwrap();
        assert_eq!(ids[0].first(), Some(&2));
        assert_eq!(ids[0].last(), Some(&3));
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let (_dir, tokenizer) = tiny_tokenizer(8);
        assert!(EncodedBatch::encode(&tokenizer, &[], &Device::Cpu).is_err());
    }
}
