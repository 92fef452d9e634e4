//! # quote-types
//!
//! Shared types for the quote matcher workspace.
//!
//! - [`Settings`]: layered configuration (defaults, config file, env, CLI)
//! - [`ReloadPolicy`]: how often a corpus file is re-read between queries
//! - [`QuoteError`]: configuration errors
//!
//! ## Usage
//!
//! ```rust
//! use quote_types::{ReloadPolicy, Settings};
//!
//! let settings = Settings::default();
//! assert_eq!(settings.reload_policy, ReloadPolicy::IfModified);
//! ```

pub mod config;
pub mod error;

pub use config::{EmbeddingBackend, EmbeddingSettings, ReloadPolicy, Settings};
pub use error::QuoteError;
