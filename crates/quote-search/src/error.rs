//! Match error types.

use thiserror::Error;

/// Errors from a single match. Both are deterministic for a given query and
/// corpus, so retrying with the same inputs is pointless.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// Query length differs from the corpus embedding dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Corpus is empty, or no entry has a defined similarity to the query
    #[error("No matching quote")]
    NoMatch,
}
