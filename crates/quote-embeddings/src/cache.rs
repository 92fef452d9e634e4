//! Local copies of the sentence-transformer files.
//!
//! A model lives in `<root>/<org>_<name>/` as three files. They are fetched
//! from HuggingFace Hub the first time the model is needed; a file is only
//! moved into the model directory once it has been copied in full, so an
//! interrupted download leaves the cache incomplete rather than corrupt.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use quote_types::config::DEFAULT_MODEL_REPO;
use quote_types::EmbeddingSettings;

use crate::error::EmbeddingError;

/// Files a BERT-style sentence-transformer needs, in download order.
pub const MODEL_FILES: &[&str] = &["config.json", "tokenizer.json", "model.safetensors"];

/// Where one model's files are kept.
#[derive(Debug, Clone)]
pub struct ModelCache {
    /// Directory holding one subdirectory per model
    pub cache_dir: PathBuf,
    /// HuggingFace repository, `org/name`
    pub repo_id: String,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new(default_root(), DEFAULT_MODEL_REPO)
    }
}

fn default_root() -> PathBuf {
    let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache"));
    base.join("quote-match").join("models")
}

impl ModelCache {
    pub fn new(cache_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
        }
    }

    /// Cache for the model named in the `[embedding]` settings block.
    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        let root = settings.expanded_cache_dir().unwrap_or_else(default_root);
        Self::new(root, settings.model_repo.as_str())
    }

    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir.join(self.repo_id.replace('/', "_"))
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.model_dir().join(filename)
    }

    /// Model files not yet present locally.
    pub fn missing_files(&self) -> Vec<&'static str> {
        MODEL_FILES
            .iter()
            .copied()
            .filter(|name| !self.file_path(name).is_file())
            .collect()
    }

    pub fn is_cached(&self) -> bool {
        self.missing_files().is_empty()
    }

    /// Last segment of the repository id, e.g. `all-MiniLM-L6-v2`.
    pub fn model_name(&self) -> &str {
        match self.repo_id.rsplit_once('/') {
            Some((_, name)) => name,
            None => &self.repo_id,
        }
    }
}

/// Resolved locations of a model's three files.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelPaths {
    fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join(MODEL_FILES[0]),
            tokenizer: dir.join(MODEL_FILES[1]),
            weights: dir.join(MODEL_FILES[2]),
        }
    }
}

/// Paths of the cached model, fetching whatever is missing first.
pub fn get_or_download_model(cache: &ModelCache) -> Result<ModelPaths, EmbeddingError> {
    let missing = cache.missing_files();
    if missing.is_empty() {
        debug!(dir = %cache.model_dir().display(), "Model files cached");
    } else {
        info!(repo = %cache.repo_id, files = ?missing, "Fetching model files");
        fetch(cache, &missing)?;
    }
    Ok(ModelPaths::in_dir(&cache.model_dir()))
}

fn fetch(cache: &ModelCache, files: &[&str]) -> Result<(), EmbeddingError> {
    let api = hf_hub::api::sync::Api::new().map_err(|e| EmbeddingError::Download(e.to_string()))?;
    let repo = api.model(cache.repo_id.clone());
    std::fs::create_dir_all(cache.model_dir())?;

    for name in files {
        let fetched = repo
            .get(name)
            .map_err(|e| EmbeddingError::Download(format!("{}: {}", name, e)))?;

        let dest = cache.file_path(name);
        let partial = dest.with_extension("partial");
        std::fs::copy(&fetched, &partial)?;
        std::fs::rename(&partial, &dest)?;
        debug!(file = name, dest = %dest.display(), "Model file stored");
    }
    Ok(())
}
