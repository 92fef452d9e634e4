//! Candle-based sentence embedder.
//!
//! Runs all-MiniLM-L6-v2 (or any BERT-family sentence-transformer with the
//! same file layout) on the CPU: tokenize, forward pass, average the hidden
//! states of real (unpadded) tokens, L2-normalize. A corpus must be embedded
//! with the same model as its queries for the scores to mean anything.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{Encoding, Tokenizer};
use tracing::{debug, info};

use crate::cache::{get_or_download_model, ModelCache};
use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

/// Tokens kept per text; longer texts are truncated.
pub const MAX_SEQ_LENGTH: usize = 256;

/// Texts per forward pass.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// all-MiniLM-L6-v2 (or compatible) loaded into memory.
pub struct CandleEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    info: ModelInfo,
}

/// Token ids and attention mask for one batch, padded to a common length.
#[derive(Debug, PartialEq)]
struct TokenBatch {
    ids: Vec<u32>,
    mask: Vec<u32>,
    rows: usize,
    width: usize,
}

/// Truncate every encoding to `MAX_SEQ_LENGTH` and right-pad with zeros to
/// the longest remaining one.
fn pad_batch(encodings: &[Encoding]) -> TokenBatch {
    let width = encodings
        .iter()
        .map(|e| e.get_ids().len().min(MAX_SEQ_LENGTH))
        .max()
        .unwrap_or(0);
    pad_rows(
        encodings
            .iter()
            .map(|e| (e.get_ids(), e.get_attention_mask())),
        encodings.len(),
        width,
    )
}

fn pad_rows<'a>(
    rows: impl Iterator<Item = (&'a [u32], &'a [u32])>,
    count: usize,
    width: usize,
) -> TokenBatch {
    let mut ids = Vec::with_capacity(count * width);
    let mut mask = Vec::with_capacity(count * width);
    for (row_ids, row_mask) in rows {
        let kept = row_ids.len().min(width);
        ids.extend_from_slice(&row_ids[..kept]);
        mask.extend_from_slice(&row_mask[..kept]);
        ids.resize(ids.len() + width - kept, 0);
        mask.resize(mask.len() + width - kept, 0);
    }
    TokenBatch {
        ids,
        mask,
        rows: count,
        width,
    }
}

/// Average `hidden` (batch, tokens, dim) over the positions where `mask`
/// (batch, tokens) is 1.
fn masked_mean(hidden: &Tensor, mask: &Tensor) -> Result<Tensor, EmbeddingError> {
    let weights = mask
        .to_dtype(DType::F32)?
        .unsqueeze(2)?
        .broadcast_as(hidden.shape())?;
    let summed = hidden.broadcast_mul(&weights)?.sum(1)?;
    let counts = weights.sum(1)?.clamp(1e-9, f64::MAX)?;
    Ok(summed.broadcast_div(&counts)?)
}

/// Parse config.json once; `hidden_size` is the pooled vector length.
fn read_config(config_json: &str) -> Result<(BertConfig, usize), EmbeddingError> {
    let invalid = |e: serde_json::Error| EmbeddingError::ModelNotFound(format!("Invalid config: {}", e));
    let value: serde_json::Value = serde_json::from_str(config_json).map_err(invalid)?;
    let hidden = value
        .get("hidden_size")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| EmbeddingError::ModelNotFound("config.json has no hidden_size".to_string()))?;
    let config: BertConfig = serde_json::from_value(value).map_err(invalid)?;
    Ok((config, hidden as usize))
}

impl CandleEmbedder {
    /// Load from `cache`, downloading the files on first use.
    pub fn load(cache: &ModelCache) -> Result<Self, EmbeddingError> {
        let paths = get_or_download_model(cache)?;
        Self::load_from_paths(
            cache.model_name(),
            &paths.config,
            &paths.tokenizer,
            &paths.weights,
        )
    }

    /// all-MiniLM-L6-v2 from the default cache directory.
    pub fn load_default() -> Result<Self, EmbeddingError> {
        Self::load(&ModelCache::default())
    }

    pub fn load_from_paths(
        name: &str,
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
    ) -> Result<Self, EmbeddingError> {
        let device = Device::Cpu;
        let (config, dimension) = read_config(&std::fs::read_to_string(config_path)?)?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        // Safety: the weights file is mapped read-only and nothing writes it
        // while the model is alive.
        let weights = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)?
        };
        let model = BertModel::load(weights, &config)?;

        info!(model = name, dim = dimension, max_seq = MAX_SEQ_LENGTH, "Embedding model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            info: ModelInfo {
                name: name.to_string(),
                dimension,
                max_sequence_length: MAX_SEQ_LENGTH,
            },
        })
    }

    /// One forward pass over at most `DEFAULT_BATCH_SIZE` texts.
    fn forward(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
        let batch = pad_batch(&encodings);

        let shape = (batch.rows, batch.width);
        let ids = Tensor::from_vec(batch.ids, shape, &self.device)?;
        let mask = Tensor::from_vec(batch.mask, shape, &self.device)?;
        let token_types = ids.zeros_like()?;

        let hidden = self.model.forward(&ids, &token_types, Some(&mask))?;
        let pooled: Vec<Vec<f32>> = masked_mean(&hidden, &mask)?.to_vec2()?;

        pooled
            .into_iter()
            .map(|values| match values.len() {
                n if n == self.info.dimension => Ok(Embedding::new(values)),
                n => Err(EmbeddingError::DimensionMismatch {
                    expected: self.info.dimension,
                    actual: n,
                }),
            })
            .collect()
    }
}

impl EmbeddingModel for CandleEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.forward(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidInput("model returned no embedding".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(DEFAULT_BATCH_SIZE) {
            out.extend(self.forward(chunk)?);
            debug!(done = out.len(), total = texts.len(), "Embedded chunk");
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_config_hidden_size() {
        let json = r#"{
            "vocab_size": 30522, "hidden_size": 384, "num_hidden_layers": 6,
            "num_attention_heads": 12, "intermediate_size": 1536,
            "hidden_act": "gelu", "hidden_dropout_prob": 0.1,
            "max_position_embeddings": 512, "type_vocab_size": 2,
            "initializer_range": 0.02, "layer_norm_eps": 1e-12, "pad_token_id": 0
        }"#;
        let (_, hidden) = read_config(json).unwrap();
        assert_eq!(hidden, 384);
    }

    #[test]
    fn test_read_config_without_hidden_size() {
        assert!(matches!(
            read_config(r#"{"vocab_size": 30522}"#),
            Err(EmbeddingError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_pad_rows_truncates_and_pads() {
        let a_ids = [101, 7, 8, 102];
        let a_mask = [1, 1, 1, 1];
        let b_ids = [101, 102];
        let b_mask = [1, 1];
        let rows = vec![(&a_ids[..], &a_mask[..]), (&b_ids[..], &b_mask[..])];

        let batch = pad_rows(rows.into_iter(), 2, 3);
        assert_eq!(batch.ids, vec![101, 7, 8, 101, 102, 0]);
        assert_eq!(batch.mask, vec![1, 1, 1, 1, 1, 0]);
        assert_eq!((batch.rows, batch.width), (2, 3));
    }

    #[test]
    fn test_masked_mean_ignores_padding() {
        let device = Device::Cpu;
        // One row, three tokens of dim 2; the last token is padding.
        let hidden = Tensor::from_vec(vec![1.0f32, 3.0, 3.0, 5.0, 100.0, 100.0], (1, 3, 2), &device)
            .unwrap();
        let mask = Tensor::from_vec(vec![1u32, 1, 0], (1, 3), &device).unwrap();

        let pooled: Vec<Vec<f32>> = masked_mean(&hidden, &mask).unwrap().to_vec2().unwrap();
        assert_eq!(pooled, vec![vec![2.0, 4.0]]);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_load_model() {
        let embedder = CandleEmbedder::load_default().unwrap();
        assert_eq!(embedder.info().dimension, 384);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_embed_batch_spans_chunks() {
        let embedder = CandleEmbedder::load_default().unwrap();
        let texts: Vec<String> = (0..DEFAULT_BATCH_SIZE + 3).map(|i| format!("quote {}", i)).collect();
        let embeddings = embedder.embed_texts(&texts).unwrap();
        assert_eq!(embeddings.len(), texts.len());
        assert!(embeddings.iter().all(|e| e.dimension() == 384));
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_similar_quotes_score_higher() {
        let embedder = CandleEmbedder::load_default().unwrap();
        let query = embedder.embed("I feel lonely and sad today").unwrap();
        let close = embedder
            .embed("Even the darkest night will end and the sun will rise")
            .unwrap();
        let far = embedder.embed("Quarterly tax filing deadlines").unwrap();

        let dot = |a: &Embedding, b: &Embedding| -> f32 {
            a.values.iter().zip(&b.values).map(|(x, y)| x * y).sum()
        };
        assert!(dot(&query, &close) > dot(&query, &far));
    }
}
