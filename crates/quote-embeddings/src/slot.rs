//! Process-wide shared embedder.
//!
//! Loading a model is expensive, so it happens once and the loaded model is
//! shared read-only by every query. A failed load is remembered as
//! [`EmbedderState::Unavailable`] and reported on every later use instead of
//! being retried or surfacing as a missing model deep inside a query.

use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use quote_types::{EmbeddingBackend, EmbeddingSettings};

use crate::cache::ModelCache;
use crate::candle::CandleEmbedder;
use crate::error::EmbeddingError;
use crate::hashing::HashingEmbedder;
use crate::model::EmbeddingModel;

/// Outcome of the one-time initialization.
#[derive(Clone)]
pub enum EmbedderState {
    Ready(Arc<dyn EmbeddingModel>),
    Unavailable(String),
}

impl std::fmt::Debug for EmbedderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbedderState::Ready(model) => f
                .debug_tuple("Ready")
                .field(&model.info().name)
                .finish(),
            EmbedderState::Unavailable(reason) => {
                f.debug_tuple("Unavailable").field(reason).finish()
            }
        }
    }
}

/// A once-initialized embedder cell.
pub struct EmbedderSlot {
    state: OnceLock<EmbedderState>,
}

static GLOBAL: EmbedderSlot = EmbedderSlot::new();

impl EmbedderSlot {
    pub const fn new() -> Self {
        Self {
            state: OnceLock::new(),
        }
    }

    /// The slot shared by the whole process.
    pub fn global() -> &'static EmbedderSlot {
        &GLOBAL
    }

    /// Return the shared embedder, running `init` only on first use.
    ///
    /// If the first `init` failed, every call returns
    /// [`EmbeddingError::Unavailable`] with the first failure's reason.
    pub fn get_or_init<F>(&self, init: F) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError>
    where
        F: FnOnce() -> Result<Arc<dyn EmbeddingModel>, EmbeddingError>,
    {
        let state = self.state.get_or_init(|| match init() {
            Ok(model) => EmbedderState::Ready(model),
            Err(e) => {
                warn!(error = %e, "Embedder initialization failed");
                EmbedderState::Unavailable(e.to_string())
            }
        });

        match state {
            EmbedderState::Ready(model) => Ok(Arc::clone(model)),
            EmbedderState::Unavailable(reason) => Err(EmbeddingError::Unavailable(reason.clone())),
        }
    }

    /// Current state, `None` before the first initialization attempt.
    pub fn state(&self) -> Option<&EmbedderState> {
        self.state.get()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state.get(), Some(EmbedderState::Ready(_)))
    }
}

impl Default for EmbedderSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the embedder described by `settings`.
///
/// Fails with `DimensionMismatch` if the model's output length differs from
/// the configured dimension, so a wrong model is caught at startup rather
/// than on the first query.
pub fn load_embedder(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError> {
    let model: Arc<dyn EmbeddingModel> = match settings.backend {
        EmbeddingBackend::Candle => {
            let cache = ModelCache::from_settings(settings);
            Arc::new(CandleEmbedder::load(&cache)?)
        }
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(settings.dimension)?),
    };

    if model.dimension() != settings.dimension {
        return Err(EmbeddingError::DimensionMismatch {
            expected: settings.dimension,
            actual: model.dimension(),
        });
    }

    info!(
        backend = settings.backend.as_str(),
        model = %model.info().name,
        dim = model.dimension(),
        "Embedder ready"
    );
    Ok(model)
}
