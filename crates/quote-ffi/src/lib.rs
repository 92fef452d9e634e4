//! # quote-ffi
//!
//! Call boundary for hosts that pass a query embedding and a corpus path and
//! expect a formatted quote back as an owned C string.
//!
//! - [`c_api`]: `extern "C"` entry points, all guarded by `catch_unwind`
//! - [`ResultBuffer`]: RAII owner of a returned handle for Rust callers
//! - [`match_quote`]: the same match as a tagged `Result`, no buffer
//!
//! Errors cross the C boundary in-band: the buffer starts with
//! [`ERROR_MARKER`] followed by the error description.

pub mod buffer;
pub mod c_api;
pub mod engine;
pub mod error;
mod ledger;

pub use buffer::{match_and_format, match_quote, BoundaryOutcome, ResultBuffer};
pub use c_api::{QuoteHandle, ERROR_MARKER};
pub use engine::{engine, initialize, Engine, EngineState};
pub use error::BoundaryError;
