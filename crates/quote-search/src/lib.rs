//! # quote-search
//!
//! Nearest-quote matching over a loaded [`Corpus`](quote_corpus::Corpus).
//!
//! - [`find_best`]: exhaustive cosine-similarity scan with first-wins ties
//! - [`format`]: the stable text layout handed back to callers
//! - [`CorpusStore`] / [`CorpusRegistry`]: cached snapshots with
//!   freshness checks and atomic swap on reload
//!
//! Matching is synchronous, allocation-free apart from the formatted string,
//! and safe to run concurrently against one shared corpus.

pub mod error;
pub mod format;
pub mod similarity;
pub mod store;

pub use error::MatchError;
pub use format::{format, format_entry, MatchReport};
pub use similarity::{cosine_similarity, find_best, find_best_with, Cosine, MatchResult, Query, Similarity};
pub use store::{CorpusRegistry, CorpusSnapshot, CorpusStore};

use quote_corpus::Corpus;

/// Match `query` against `corpus` and render the winner.
pub fn match_and_format(query: &[f32], corpus: &Corpus) -> Result<String, MatchError> {
    find_best(query, corpus).map(|result| format(&result))
}
