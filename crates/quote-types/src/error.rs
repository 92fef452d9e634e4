//! Error types shared across the quote matcher.

use thiserror::Error;

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum QuoteError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
