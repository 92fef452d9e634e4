//! Quote entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Author/source metadata attached to a quote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Book, speech, film, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Fields the matcher does not interpret, carried through unchanged
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl QuoteMetadata {
    pub fn new(author: Option<String>, source: Option<String>) -> Self {
        Self {
            author,
            source,
            extra: BTreeMap::new(),
        }
    }
}

/// Id given to the record at `index` when it carries none. The `#` prefix
/// keeps these apart from explicit numeric ids such as `1`.
pub fn position_id(index: usize) -> String {
    format!("#{}", index)
}

/// One quote with its precomputed embedding.
///
/// Immutable once built; the Euclidean norm of the embedding is computed up
/// front so each comparison needs only one dot product.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteEntry {
    id: String,
    text: String,
    metadata: QuoteMetadata,
    embedding: Vec<f32>,
    norm: f64,
}

impl QuoteEntry {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        metadata: QuoteMetadata,
        embedding: Vec<f32>,
    ) -> Self {
        let norm = embedding
            .iter()
            .map(|v| f64::from(*v) * f64::from(*v))
            .sum::<f64>()
            .sqrt();
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
            embedding,
            norm,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn metadata(&self) -> &QuoteMetadata {
        &self.metadata
    }

    pub fn author(&self) -> Option<&str> {
        self.metadata.author.as_deref()
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.source.as_deref()
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    /// Euclidean norm of the embedding.
    pub fn norm(&self) -> f64 {
        self.norm
    }

    /// True if the embedding has zero length (as a vector), which makes its
    /// cosine similarity undefined.
    pub fn is_degenerate(&self) -> bool {
        self.norm == 0.0 || !self.norm.is_finite()
    }
}
