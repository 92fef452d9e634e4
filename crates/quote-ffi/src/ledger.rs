//! Registry of result buffers handed out across the boundary.
//!
//! Every buffer is stored here under a handle drawn from a counter that only
//! moves forward, so a handle is never issued twice. Releasing a handle that
//! is not outstanding (never issued, or already released) is refused, even
//! after the allocator has reused the memory of the buffer it once named.

use std::collections::HashMap;
use std::ffi::{c_char, CString};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::warn;

/// Handle value that never names a buffer.
pub const INVALID_HANDLE: u64 = 0;

#[derive(Default)]
struct Ledger {
    next: u64,
    buffers: HashMap<u64, CString>,
}

fn ledger() -> MutexGuard<'static, Ledger> {
    static LEDGER: OnceLock<Mutex<Ledger>> = OnceLock::new();
    LEDGER
        .get_or_init(|| Mutex::new(Ledger::default()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Store `text` as a NUL-terminated string and return its handle.
///
/// Interior NUL bytes cannot be represented in a C string and are dropped.
pub(crate) fn issue(text: String) -> u64 {
    let bytes: Vec<u8> = if text.contains('\0') {
        text.into_bytes().into_iter().filter(|b| *b != 0).collect()
    } else {
        text.into_bytes()
    };
    let c_string = CString::new(bytes).unwrap_or_default();

    let mut ledger = ledger();
    ledger.next += 1;
    let handle = ledger.next;
    ledger.buffers.insert(handle, c_string);
    handle
}

/// Start of the buffer named by `handle`, or `None` if it is not outstanding.
///
/// The pointer stays valid until `handle` is released; moving the ledger's
/// map does not move the string data it owns.
pub(crate) fn text_ptr(handle: u64) -> Option<*const c_char> {
    ledger().buffers.get(&handle).map(|text| text.as_ptr())
}

/// Copy of the buffer named by `handle`.
pub(crate) fn text(handle: u64) -> Option<String> {
    ledger()
        .buffers
        .get(&handle)
        .map(|text| text.to_string_lossy().into_owned())
}

/// Free the buffer named by `handle`. Returns false, and frees nothing, if
/// `handle` is not outstanding.
pub(crate) fn release(handle: u64) -> bool {
    let removed = ledger().buffers.remove(&handle);
    if removed.is_none() {
        warn!(handle, "Refusing to release unknown result handle");
        return false;
    }
    true
}

/// Number of buffers issued and not yet released.
pub(crate) fn outstanding() -> usize {
    ledger().buffers.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_issue_release_once() {
        let _serial = crate::test_support::serial();
        let before = outstanding();

        let handle = issue("\"Carpe diem.\"".to_string());
        assert_ne!(handle, INVALID_HANDLE);
        assert_eq!(outstanding(), before + 1);
        let ptr = text_ptr(handle).unwrap();
        assert_eq!(unsafe { CStr::from_ptr(ptr) }.to_str().unwrap(), "\"Carpe diem.\"");

        assert!(release(handle));
        assert_eq!(outstanding(), before);
        assert!(!release(handle));
        assert!(text_ptr(handle).is_none());
    }

    #[test]
    fn test_stale_handle_cannot_release_successor() {
        let _serial = crate::test_support::serial();

        let first = issue("same size".to_string());
        assert!(release(first));
        let second = issue("same size".to_string());

        assert_ne!(first, second);
        assert!(!release(first));
        assert_eq!(text(second).as_deref(), Some("same size"));
        assert!(release(second));
    }

    #[test]
    fn test_unknown_handles_refused() {
        assert!(!release(INVALID_HANDLE));
        assert!(!release(u64::MAX));
        assert!(text(u64::MAX).is_none());
    }

    #[test]
    fn test_interior_nul_stripped() {
        let _serial = crate::test_support::serial();
        let handle = issue("a\0b".to_string());
        assert_eq!(text(handle).as_deref(), Some("ab"));
        assert!(release(handle));
    }
}
