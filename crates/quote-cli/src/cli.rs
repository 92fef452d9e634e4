//! CLI argument parsing for `quotematch`.
//!
//! CLI flags override every other configuration source.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

/// Quote matcher
///
/// Finds the quote in a corpus whose embedding is closest to a query.
#[derive(Parser, Debug)]
#[command(name = "quotematch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/quote-match/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the quote closest to a query
    Match(MatchArgs),

    /// Embed a quote list and write a corpus file
    EmbedCorpus {
        /// Quotes without embeddings (JSON array)
        #[arg(short, long)]
        input: PathBuf,

        /// Corpus file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Quotes embedded per model call
        #[arg(long, default_value = "32")]
        batch_size: usize,
    },

    /// Show corpus statistics
    Inspect {
        /// Corpus file (default from config)
        #[arg(long)]
        corpus: Option<String>,
    },
}

/// Arguments of `quotematch match`
#[derive(Args, Debug, Clone)]
#[command(group(
    ArgGroup::new("query")
        .required(true)
        .args(["embedding_file", "vector", "text"])
))]
pub struct MatchArgs {
    /// Corpus file (default from config)
    #[arg(long)]
    pub corpus: Option<String>,

    /// JSON file holding `{"embedding": [...]}` or a bare array
    #[arg(long)]
    pub embedding_file: Option<PathBuf>,

    /// Comma-separated query vector, e.g. "0.9,0.1"
    #[arg(long, allow_hyphen_values = true)]
    pub vector: Option<String>,

    /// Text to embed with the configured model
    #[arg(long)]
    pub text: Option<String>,

    /// Print the match as JSON, score included
    #[arg(long)]
    pub json: bool,

    /// Print the similarity score after the quote
    #[arg(long)]
    pub show_score: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
