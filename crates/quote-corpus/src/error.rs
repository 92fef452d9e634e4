//! Corpus error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading a corpus. Every variant is fatal to
/// the load attempt; no partially loaded corpus is ever returned.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Corpus file does not exist
    #[error("Corpus not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Corpus file exists but could not be read
    #[error("Failed to read corpus {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Container is not a JSON array of records
    #[error("Corpus parse error: {0}")]
    ParseError(String),

    /// A single record is unusable
    #[error("Malformed corpus entry {index}: {reason}")]
    MalformedEntry { index: usize, reason: String },
}

/// Errors that can occur while writing a corpus file.
#[derive(Debug, Error)]
pub enum WriteError {
    /// IO error
    #[error("Failed to write corpus {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
