//! # quote-corpus
//!
//! Loads a curated quote collection with precomputed embeddings into an
//! immutable, queryable [`Corpus`].
//!
//! ## File format
//!
//! A UTF-8 JSON array of records:
//!
//! ```json
//! [
//!   {"id": "q1", "text": "Stay hungry, stay foolish.", "author": "Steve Jobs",
//!    "source": "Stanford commencement", "embedding": [0.12, -0.03, ...]}
//! ]
//! ```
//!
//! `quote` is accepted for `text` and `book` for `source`. Any other fields
//! are kept as opaque metadata. Every embedding must have the same length;
//! one bad record fails the whole load.

pub mod corpus;
pub mod draft;
pub mod entry;
pub mod error;
mod record;

pub use corpus::{load, Corpus};
pub use draft::{read_drafts, write_corpus, QuoteDraft};
pub use entry::{position_id, QuoteEntry, QuoteMetadata};
pub use error::{LoadError, WriteError};
