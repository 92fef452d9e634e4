//! Configuration loading for the quote matcher.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `~/.config/quote-match/config.toml`
//! (platform equivalent via `directories`).

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::QuoteError;

/// Default corpus file, relative to the working directory.
pub const DEFAULT_CORPUS_PATH: &str = "quotes_with_embeddings.json";

/// Default sentence-embedding model repository.
pub const DEFAULT_MODEL_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Output dimension of all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// When a cached corpus is re-read from disk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReloadPolicy {
    /// Re-parse the corpus file on every query.
    Always,
    /// Re-parse only when the file's modification time or length changed (default)
    #[default]
    IfModified,
    /// Parse once and serve that snapshot for the life of the process.
    Never,
}

impl ReloadPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadPolicy::Always => "always",
            ReloadPolicy::IfModified => "if_modified",
            ReloadPolicy::Never => "never",
        }
    }
}

/// Which embedder turns query text into vectors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Local all-MiniLM-L6-v2 inference via Candle (default)
    #[default]
    Candle,
    /// Deterministic feature-hashing embedder, no model download
    Hashing,
}

impl EmbeddingBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingBackend::Candle => "candle",
            EmbeddingBackend::Hashing => "hashing",
        }
    }
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    /// HuggingFace repository of the sentence-embedding model
    #[serde(default = "default_model_repo")]
    pub model_repo: String,

    /// Override for the model cache directory
    #[serde(default)]
    pub cache_dir: Option<String>,

    /// Vector length produced by the model. Must match the corpus.
    #[serde(default = "default_embedding_dim")]
    pub dimension: usize,
}

fn default_model_repo() -> String {
    DEFAULT_MODEL_REPO.to_string()
}

fn default_embedding_dim() -> usize {
    DEFAULT_EMBEDDING_DIM
}

impl EmbeddingSettings {
    /// Model cache directory with a leading `~/` expanded, if overridden.
    pub fn expanded_cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir.as_deref().map(expand_home)
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model_repo: default_model_repo(),
            cache_dir: None,
            dimension: default_embedding_dim(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the corpus file (JSON array of quotes with embeddings)
    #[serde(default = "default_corpus_path")]
    pub corpus_path: String,

    /// When the corpus file is re-read
    #[serde(default)]
    pub reload_policy: ReloadPolicy,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Print the similarity score as a separate field
    #[serde(default)]
    pub show_score: bool,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

fn default_corpus_path() -> String {
    DEFAULT_CORPUS_PATH.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
            reload_policy: ReloadPolicy::default(),
            log_level: default_log_level(),
            show_score: false,
            embedding: EmbeddingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/quote-match/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (QUOTE_*, nested keys separated by `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, QuoteError> {
        let default_config_path = config_dir().join("config");

        let mut builder = Config::builder()
            .set_default("corpus_path", default_corpus_path())
            .map_err(|e| QuoteError::Config(e.to_string()))?
            .set_default("reload_policy", ReloadPolicy::default().as_str())
            .map_err(|e| QuoteError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| QuoteError::Config(e.to_string()))?
            .set_default("show_score", false)
            .map_err(|e| QuoteError::Config(e.to_string()))?
            .set_default("embedding.backend", EmbeddingBackend::default().as_str())
            .map_err(|e| QuoteError::Config(e.to_string()))?
            .set_default("embedding.model_repo", default_model_repo())
            .map_err(|e| QuoteError::Config(e.to_string()))?
            .set_default("embedding.dimension", default_embedding_dim() as i64)
            .map_err(|e| QuoteError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // QUOTE_CORPUS_PATH, QUOTE_RELOAD_POLICY, QUOTE_EMBEDDING__BACKEND, ...
        builder = builder.add_source(
            Environment::with_prefix("QUOTE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| QuoteError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| QuoteError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), QuoteError> {
        if self.corpus_path.trim().is_empty() {
            return Err(QuoteError::Config("corpus_path must not be empty".to_string()));
        }
        if self.embedding.dimension == 0 {
            return Err(QuoteError::Config(
                "embedding.dimension must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Corpus path with a leading `~/` expanded to the home directory.
    pub fn expanded_corpus_path(&self) -> PathBuf {
        expand_home(&self.corpus_path)
    }
}

fn config_dir() -> PathBuf {
    ProjectDirs::from("", "", "quote-match")
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|b| b.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
