//! The contract between text and the vectors the matcher compares.

use crate::error::EmbeddingError;

/// Vector produced for one text.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    /// Unit length unless built with `from_raw` or all zeros
    pub values: Vec<f32>,
}

impl Embedding {
    /// Scale `values` to unit length. An all-zero vector has no direction
    /// and is kept unchanged.
    pub fn new(mut values: Vec<f32>) -> Self {
        let length = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if length > 0.0 {
            values.iter_mut().for_each(|x| *x /= length);
        }
        Self { values }
    }

    /// Keep `values` exactly as given.
    pub fn from_raw(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.values
    }
}

/// Static description of a loaded model.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// e.g. `all-MiniLM-L6-v2`
    pub name: String,
    /// Output vector length
    pub dimension: usize,
    /// Tokens considered per text
    pub max_sequence_length: usize,
}

/// Turns text into embeddings.
///
/// A model is loaded once and then shared across threads, hence
/// `Send + Sync`. Every vector a model returns has length
/// [`dimension`](Self::dimension).
pub trait EmbeddingModel: Send + Sync {
    fn info(&self) -> &ModelInfo;

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Embed several texts, in order. Models that can batch override this.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let borrowed: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.embed_batch(&borrowed)
    }

    fn dimension(&self) -> usize {
        self.info().dimension
    }
}
