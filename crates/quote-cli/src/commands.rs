//! Command implementations.
//!
//! Each command returns the text destined for stdout; `main` prints it.
//! Logs go to stderr so stdout carries only the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use quote_corpus::{read_drafts, write_corpus, Corpus};
use quote_embeddings::{load_embedder, EmbedderSlot, Embedding, EmbeddingModel};
use quote_search::{find_best, format, CorpusStore, MatchReport};
use quote_types::{EmbeddingSettings, ReloadPolicy, Settings};

use crate::cli::MatchArgs;

/// Load configuration and apply CLI overrides (highest precedence).
pub fn load_settings(config_path: Option<&str>, log_level: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    Ok(settings)
}

/// Install the stderr tracing subscriber.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Where the query vector comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySource {
    EmbeddingFile(PathBuf),
    Vector(String),
    Text(String),
}

impl QuerySource {
    pub fn from_args(args: &MatchArgs) -> Result<Self> {
        match (&args.embedding_file, &args.vector, &args.text) {
            (Some(path), None, None) => Ok(QuerySource::EmbeddingFile(path.clone())),
            (None, Some(vector), None) => Ok(QuerySource::Vector(vector.clone())),
            (None, None, Some(text)) => Ok(QuerySource::Text(text.clone())),
            _ => bail!("Exactly one of --embedding-file, --vector or --text is required"),
        }
    }
}

/// `{"embedding": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingFile {
    Wrapped { embedding: Vec<f32> },
    Bare(Vec<f32>),
}

/// Read a query embedding from a JSON file.
pub fn read_embedding_file(path: &Path) -> Result<Vec<f32>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read embedding file {}", path.display()))?;
    let parsed: EmbeddingFile = serde_json::from_str(&json).with_context(|| {
        format!(
            "{} must hold {{\"embedding\": [numbers]}} or a bare array of numbers",
            path.display()
        )
    })?;
    Ok(match parsed {
        EmbeddingFile::Wrapped { embedding } => embedding,
        EmbeddingFile::Bare(values) => values,
    })
}

/// Parse a comma-separated vector such as `"0.9, 0.1"`.
pub fn parse_vector(input: &str) -> Result<Vec<f32>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split(',')
        .enumerate()
        .map(|(i, part)| {
            part.trim()
                .parse::<f32>()
                .with_context(|| format!("Vector component {} ({:?}) is not a number", i, part.trim()))
        })
        .collect()
}

fn shared_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingModel>> {
    EmbedderSlot::global()
        .get_or_init(|| load_embedder(settings))
        .context("Embedding model unavailable")
}

/// Embed `text` with the configured model off the async runtime.
pub async fn embed_text(settings: &EmbeddingSettings, text: String) -> Result<Vec<f32>> {
    let settings = settings.clone();
    tokio::task::spawn_blocking(move || -> Result<Vec<f32>> {
        let embedder = shared_embedder(&settings)?;
        let embedding = embedder.embed(&text).context("Failed to embed query text")?;
        Ok(embedding.into_vec())
    })
    .await
    .context("Embedding task panicked")?
}

async fn resolve_query(settings: &Settings, source: QuerySource) -> Result<Vec<f32>> {
    match source {
        QuerySource::EmbeddingFile(path) => read_embedding_file(&path),
        QuerySource::Vector(vector) => parse_vector(&vector),
        QuerySource::Text(text) => embed_text(&settings.embedding, text).await,
    }
}

/// `quotematch match`
pub async fn match_command(settings: &Settings, args: &MatchArgs) -> Result<String> {
    let corpus_path = args
        .corpus
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.expanded_corpus_path());

    let query = resolve_query(settings, QuerySource::from_args(args)?).await?;
    let corpus = Corpus::load(&corpus_path)
        .with_context(|| format!("Failed to load corpus {}", corpus_path.display()))?;

    let result = find_best(&query, &corpus)?;
    debug!(index = result.index, score = result.score, "Match selected");

    if args.json {
        let report = MatchReport::from(&result);
        return serde_json::to_string_pretty(&report).context("Failed to serialize match");
    }

    let mut out = format(&result);
    if args.show_score || settings.show_score {
        out.push_str(&format!("\nscore: {:.4}", result.score));
    }
    Ok(out)
}

/// Summary of a written corpus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusSummary {
    pub path: PathBuf,
    pub entries: usize,
    pub dimension: usize,
}

/// `quotematch embed-corpus`
pub async fn embed_corpus(
    settings: &Settings,
    input: &Path,
    output: &Path,
    batch_size: usize,
) -> Result<CorpusSummary> {
    if batch_size == 0 {
        bail!("--batch-size must be > 0");
    }
    let embedding_settings = settings.embedding.clone();
    let input = input.to_path_buf();
    let output = output.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<CorpusSummary> {
        let drafts = read_drafts(&input)
            .with_context(|| format!("Failed to read quotes {}", input.display()))?;
        let embedder = shared_embedder(&embedding_settings)?;
        let total = drafts.len();
        info!(quotes = total, batch_size, "Embedding quotes");

        let mut vectors = Vec::with_capacity(total);
        for (batch, chunk) in drafts.chunks(batch_size).enumerate() {
            let texts: Vec<&str> = chunk.iter().map(|d| d.text.as_str()).collect();
            let embeddings = embedder
                .embed_batch(&texts)
                .with_context(|| format!("Failed to embed batch {}", batch))?;
            vectors.extend(embeddings.into_iter().map(Embedding::into_vec));
            debug!(batch, done = vectors.len(), total, "Batch embedded");
        }

        let entries = drafts
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (draft, vector))| draft.into_entry(index, vector))
            .collect();
        let corpus = Corpus::from_entries(entries).context("Embedded corpus is invalid")?;
        write_corpus(&output, &corpus)?;

        Ok(CorpusSummary {
            path: output,
            entries: corpus.len(),
            dimension: corpus.dimension(),
        })
    })
    .await
    .context("Embedding task panicked")?
}

/// `quotematch inspect`
pub fn inspect(settings: &Settings, corpus: Option<&str>) -> Result<String> {
    let path = corpus
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.expanded_corpus_path());
    let store = CorpusStore::open(&path, ReloadPolicy::Never)
        .with_context(|| format!("Failed to load corpus {}", path.display()))?;
    let snapshot = store.current()?;
    let corpus = snapshot.corpus();

    Ok(format!(
        "Corpus: {}\nEntries: {}\nDimension: {}\nDegenerate entries: {}\nLoaded at: {}",
        path.display(),
        corpus.len(),
        corpus.dimension(),
        corpus.degenerate_count(),
        snapshot.loaded_at().to_rfc3339()
    ))
}
