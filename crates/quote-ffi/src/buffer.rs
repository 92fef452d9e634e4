//! Safe Rust view of the C API.
//!
//! [`ResultBuffer`] owns one handle returned by `quote_match_and_format` and
//! releases it when dropped, so a Rust caller cannot leak it or release it
//! twice. [`match_quote`] skips the buffer entirely and returns a tagged
//! `Result`.

use std::ffi::CString;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use crate::c_api::{encode_error, panic_message, quote_match_and_format, quote_result_free, QuoteHandle, ERROR_MARKER};
use crate::engine::engine;
use crate::error::BoundaryError;
use crate::ledger;

/// What a result buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryOutcome<'a> {
    /// Formatted quote
    Quote(&'a str),
    /// Error description, without the marker
    Error(&'a str),
}

impl<'a> BoundaryOutcome<'a> {
    /// Split in-band text on the error marker.
    pub fn classify(text: &'a str) -> Self {
        match text.strip_prefix(ERROR_MARKER) {
            Some(message) => BoundaryOutcome::Error(message),
            None => BoundaryOutcome::Quote(text),
        }
    }
}

/// An outstanding result handle. Released on drop.
///
/// The text is copied out when the buffer is adopted, so reading it never
/// touches memory the ledger might already have freed.
#[derive(Debug)]
pub struct ResultBuffer {
    handle: QuoteHandle,
    text: String,
}

impl ResultBuffer {
    /// Take ownership of a handle returned by `quote_match_and_format`.
    /// Returns `None` if the handle is not outstanding.
    ///
    /// Nothing else may release `handle` afterwards; a second owner's
    /// release would be refused.
    pub fn from_handle(handle: QuoteHandle) -> Option<Self> {
        ledger::text(handle).map(|text| Self { handle, text })
    }

    /// Give up ownership without releasing. The caller becomes responsible
    /// for passing the handle to `quote_result_free`.
    pub fn into_handle(self) -> QuoteHandle {
        let handle = self.handle;
        std::mem::forget(self);
        handle
    }

    pub fn handle(&self) -> QuoteHandle {
        self.handle
    }

    /// Buffer contents, with interior NULs already stripped.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn outcome(&self) -> BoundaryOutcome<'_> {
        BoundaryOutcome::classify(&self.text)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome(), BoundaryOutcome::Error(_))
    }

    /// Copy out the contents as a tagged result and release the buffer.
    pub fn into_result(self) -> Result<String, String> {
        match self.outcome() {
            BoundaryOutcome::Quote(text) => Ok(text.to_string()),
            BoundaryOutcome::Error(message) => Err(message.to_string()),
        }
    }
}

impl Drop for ResultBuffer {
    fn drop(&mut self) {
        let status = quote_result_free(self.handle);
        if status != 0 {
            tracing::warn!(handle = self.handle, status, "Result handle was already released");
        }
    }
}

/// Match through the C entry point and return the owned buffer.
pub fn match_and_format(query: &[f32], corpus_path: &Path) -> ResultBuffer {
    let handle = match path_to_c_string(corpus_path) {
        Ok(path) => unsafe { quote_match_and_format(query.as_ptr(), query.len(), path.as_ptr()) },
        Err(e) => ledger::issue(encode_error(&e)),
    };
    // Both producers above return a handle that was just issued.
    ResultBuffer::from_handle(handle).unwrap_or_else(|| ResultBuffer {
        handle: ledger::INVALID_HANDLE,
        text: format!("{}internal error: result handle {} missing", ERROR_MARKER, handle),
    })
}

/// Match without going through a C buffer.
pub fn match_quote(query: &[f32], corpus_path: &Path) -> Result<String, BoundaryError> {
    catch_unwind(AssertUnwindSafe(|| engine()?.respond(query, corpus_path)))
        .unwrap_or_else(|payload| Err(BoundaryError::Panic(panic_message(payload.as_ref()))))
}

fn path_to_c_string(path: &Path) -> Result<CString, BoundaryError> {
    let path = path
        .to_str()
        .ok_or_else(|| BoundaryError::InvalidPath("path is not valid UTF-8".to_string()))?;
    CString::new(path).map_err(|e| BoundaryError::InvalidPath(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn corpus_path(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("quotes.json");
        std::fs::write(
            &path,
            r#"[{"text":"Know thyself.","author":"Socrates","embedding":[1,0]},
                {"text":"Carpe diem.","embedding":[0,1]}]"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn test_buffer_released_on_drop() {
        let _serial = crate::test_support::serial();
        let dir = TempDir::new().unwrap();
        let path = corpus_path(&dir);
        let baseline = ledger::outstanding();

        {
            let buffer = match_and_format(&[0.1, 0.9], &path);
            assert_eq!(ledger::outstanding(), baseline + 1);
            assert_eq!(buffer.outcome(), BoundaryOutcome::Quote("\"Carpe diem.\""));
        }
        assert_eq!(ledger::outstanding(), baseline);
    }

    #[test]
    fn test_error_outcome() {
        let _serial = crate::test_support::serial();
        let dir = TempDir::new().unwrap();
        let path = corpus_path(&dir);

        let buffer = match_and_format(&[1.0], &path);
        assert!(buffer.is_error());
        assert_eq!(
            buffer.into_result().unwrap_err(),
            "Dimension mismatch: expected 2, got 1"
        );
    }

    #[test]
    fn test_interior_nul_path() {
        let _serial = crate::test_support::serial();
        let buffer = match_and_format(&[1.0], Path::new("bad\0path.json"));
        assert!(matches!(buffer.outcome(), BoundaryOutcome::Error(m) if m.starts_with("invalid corpus path")));
    }

    #[test]
    fn test_into_handle_hands_over_ownership() {
        let _serial = crate::test_support::serial();
        let dir = TempDir::new().unwrap();
        let path = corpus_path(&dir);

        let handle = match_and_format(&[1.0, 0.0], &path).into_handle();
        assert_eq!(quote_result_free(handle), 0);
        assert_eq!(quote_result_free(handle), -1);
        assert!(ResultBuffer::from_handle(handle).is_none());
    }

    #[test]
    fn test_match_quote_tagged() {
        let dir = TempDir::new().unwrap();
        let path = corpus_path(&dir);

        assert_eq!(
            match_quote(&[0.9, 0.1], &path).unwrap(),
            "\"Know thyself.\"\n- Socrates"
        );
        assert!(matches!(
            match_quote(&[0.0, 0.0], &path),
            Err(BoundaryError::Match(quote_search::MatchError::NoMatch))
        ));
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            BoundaryOutcome::classify("ERROR: No matching quote"),
            BoundaryOutcome::Error("No matching quote")
        );
        assert_eq!(BoundaryOutcome::classify("\"Hi\""), BoundaryOutcome::Quote("\"Hi\""));
    }
}
