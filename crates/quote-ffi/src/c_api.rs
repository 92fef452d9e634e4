//! C-compatible API.
//!
//! Every function runs its body under `std::panic::catch_unwind`, so a panic
//! never unwinds into the host.
//!
//! `quote_match_and_format` always returns a handle to an owned,
//! NUL-terminated UTF-8 buffer. On success it holds the formatted quote; on
//! failure it holds `"ERROR: "` followed by a description. The text is read
//! with `quote_result_text` and each handle must be handed back to
//! `quote_result_free` exactly once.
//!
//! Handles are never reused. Freeing a handle this library did not return,
//! or freeing one twice, is refused even if a newer buffer now occupies the
//! memory the old one did.

use std::any::Any;
use std::ffi::{c_char, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use crate::engine::{engine, initialize, EngineState};
use crate::error::BoundaryError;
use crate::ledger;

/// Opaque name of one result buffer. Zero never names a buffer.
pub type QuoteHandle = u64;

/// Prefix of every error buffer.
pub const ERROR_MARKER: &str = "ERROR: ";

static ERROR_MARKER_C: &CStr = c"ERROR: ";

pub(crate) fn encode_error(err: &BoundaryError) -> String {
    format!("{}{}", ERROR_MARKER, err)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Validate the raw arguments and run the match.
///
/// # Safety
/// See [`quote_match_and_format`].
unsafe fn respond_raw(
    query: *const f32,
    query_len: usize,
    corpus_path: *const c_char,
) -> Result<String, BoundaryError> {
    if corpus_path.is_null() {
        return Err(BoundaryError::NullArgument("corpus_path"));
    }
    let path = unsafe { CStr::from_ptr(corpus_path) }
        .to_str()
        .map_err(|e| BoundaryError::InvalidPath(e.to_string()))?;
    if path.is_empty() {
        return Err(BoundaryError::InvalidPath("path is empty".to_string()));
    }

    let query: &[f32] = if query_len == 0 {
        &[]
    } else if query.is_null() {
        return Err(BoundaryError::NullArgument("query"));
    } else {
        unsafe { std::slice::from_raw_parts(query, query_len) }
    };

    engine()?.respond(query, Path::new(path))
}

/// Find the quote closest to `query` in the corpus at `corpus_path`.
///
/// Never returns 0. The returned buffer is owned by the caller and must be
/// released with [`quote_result_free`].
///
/// # Safety
/// - `query` must point to `query_len` readable `f32`s, or be NULL with
///   `query_len == 0`.
/// - `corpus_path` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn quote_match_and_format(
    query: *const f32,
    query_len: usize,
    corpus_path: *const c_char,
) -> QuoteHandle {
    let outcome = catch_unwind(AssertUnwindSafe(|| unsafe {
        respond_raw(query, query_len, corpus_path)
    }))
    .unwrap_or_else(|payload| Err(BoundaryError::Panic(panic_message(payload.as_ref()))));

    let text = match outcome {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(error = %e, "Boundary call failed");
            encode_error(&e)
        }
    };

    // Issuing only allocates and records; a panic here would be an
    // allocation failure, which aborts rather than unwinds.
    ledger::issue(text)
}

/// Text of an outstanding buffer, or NULL if `handle` is not outstanding.
///
/// The pointer is borrowed: it stays valid until `handle` is passed to
/// [`quote_result_free`] and must not be freed by the caller.
#[no_mangle]
pub extern "C" fn quote_result_text(handle: QuoteHandle) -> *const c_char {
    catch_unwind(|| ledger::text_ptr(handle))
        .ok()
        .flatten()
        .unwrap_or(std::ptr::null())
}

/// Release a buffer returned by [`quote_match_and_format`].
///
/// Returns 0 when the buffer was released or `handle` is 0, and -1 when
/// `handle` is not outstanding (already released, or never issued).
#[no_mangle]
pub extern "C" fn quote_result_free(handle: QuoteHandle) -> i32 {
    if handle == ledger::INVALID_HANDLE {
        return 0;
    }
    catch_unwind(|| ledger::release(handle))
        .map(|released| if released { 0 } else { -1 })
        .unwrap_or(-1)
}

/// The in-band error prefix, `"ERROR: "`.
///
/// The returned pointer is static and must not be freed.
#[no_mangle]
pub extern "C" fn quote_error_marker() -> *const c_char {
    ERROR_MARKER_C.as_ptr()
}

/// Number of buffers issued and not yet released.
#[no_mangle]
pub extern "C" fn quote_live_buffers() -> usize {
    catch_unwind(ledger::outstanding).unwrap_or(0)
}

/// Build the engine from the settings file at `config_path` (NULL for the
/// default layers only) ahead of the first match.
///
/// Returns 0 if the engine is ready and -1 if it is unavailable. Only the
/// first initialization takes effect; later calls report the existing state.
///
/// # Safety
/// `config_path` must be NULL or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn quote_engine_init(config_path: *const c_char) -> i32 {
    catch_unwind(AssertUnwindSafe(|| {
        let config_path = if config_path.is_null() {
            None
        } else {
            match unsafe { CStr::from_ptr(config_path) }.to_str() {
                Ok(s) => Some(s),
                Err(_) => return -1,
            }
        };
        match initialize(config_path) {
            EngineState::Ready(_) => 0,
            EngineState::Unavailable(_) => -1,
        }
    }))
    .unwrap_or(-1)
}
