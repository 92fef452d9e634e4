//! Boundary error types.

use thiserror::Error;

use quote_corpus::LoadError;
use quote_search::MatchError;

/// Everything that can go wrong in one call across the boundary.
///
/// The `Display` text is what follows the in-band error marker in a
/// returned buffer.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// A required pointer argument was null
    #[error("{0} is null")]
    NullArgument(&'static str),

    /// Corpus path is not valid UTF-8 or is empty
    #[error("invalid corpus path: {0}")]
    InvalidPath(String),

    /// Engine failed to initialize
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// Corpus could not be loaded
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Query could not be matched
    #[error(transparent)]
    Match(#[from] MatchError),

    /// A panic was caught before it could cross the boundary
    #[error("internal error: {0}")]
    Panic(String),
}
