//! `quotematch` library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (match, embed-corpus, inspect)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, MatchArgs};
pub use commands::{
    embed_corpus, embed_text, init_logging, inspect, load_settings, match_command, parse_vector,
    read_embedding_file, CorpusSummary, QuerySource,
};
