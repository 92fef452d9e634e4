//! Deterministic feature-hashing embedder.
//!
//! Each lowercase word and each adjacent word pair is hashed (FNV-1a) into
//! one of `dimension` buckets with a +1/-1 sign taken from the hash's top
//! bit; the bucket counts are then L2-normalized. No model download, stable
//! across runs and platforms, and texts sharing words land close together.
//! Useful for tests and offline demos; quality is far below a real model.

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hashing embedder.
pub struct HashingEmbedder {
    info: ModelInfo,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::InvalidInput(
                "hashing embedder dimension must be > 0".to_string(),
            ));
        }
        Ok(Self {
            info: ModelInfo {
                name: "feature-hashing".to_string(),
                dimension,
                max_sequence_length: usize::MAX,
            },
        })
    }

    fn add_feature(&self, values: &mut [f32], feature: &str) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % values.len() as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        values[bucket] += sign;
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

impl EmbeddingModel for HashingEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let mut values = vec![0.0f32; self.info.dimension];
        let words = tokens(text);

        for word in &words {
            self.add_feature(&mut values, word);
        }
        for pair in words.windows(2) {
            self.add_feature(&mut values, &format!("{} {}", pair[0], pair[1]));
        }

        Ok(Embedding::new(values))
    }
}
