//! quotematch
//!
//! Prints the quote whose embedding is closest to a query.
//!
//! # Usage
//!
//! ```bash
//! quotematch match --embedding-file user_embedding.json
//! quotematch match --text "persevere through hardship" --show-score
//! quotematch embed-corpus --input quotes.json --output quotes_with_embeddings.json
//! quotematch inspect
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/quote-match/config.toml)
//! 3. Environment variables (QUOTE_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use quote_cli::{embed_corpus, init_logging, inspect, load_settings, match_command, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref(), cli.log_level.as_deref())?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Match(args) => {
            println!("{}", match_command(&settings, &args).await?);
        }
        Commands::EmbedCorpus {
            input,
            output,
            batch_size,
        } => {
            let summary = embed_corpus(&settings, &input, &output, batch_size).await?;
            println!(
                "Wrote {} quotes ({} dimensions) to {}",
                summary.entries,
                summary.dimension,
                summary.path.display()
            );
        }
        Commands::Inspect { corpus } => {
            println!("{}", inspect(&settings, corpus.as_deref())?);
        }
    }

    Ok(())
}
