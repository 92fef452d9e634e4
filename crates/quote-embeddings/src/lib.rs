//! # quote-embeddings
//!
//! Turns free-form query text into the fixed-length vectors the matcher
//! compares against the corpus.
//!
//! The matcher itself only ever sees `&[f32]`; this crate is the upstream
//! collaborator that produces them.
//!
//! ## Features
//! - Local inference via Candle (all-MiniLM-L6-v2, 384 dimensions)
//! - Automatic model file caching from HuggingFace Hub
//! - [`HashingEmbedder`]: deterministic, dependency-free fallback
//! - [`EmbedderSlot`]: load once, share read-only, explicit unavailable state

pub mod cache;
pub mod candle;
pub mod error;
pub mod hashing;
pub mod model;
pub mod slot;

pub use crate::candle::CandleEmbedder;
pub use cache::{get_or_download_model, ModelCache, ModelPaths, MODEL_FILES};
pub use error::EmbeddingError;
pub use hashing::HashingEmbedder;
pub use model::{Embedding, EmbeddingModel, ModelInfo};
pub use slot::{load_embedder, EmbedderSlot, EmbedderState};
