// ── Boundary error types ──
//
// Errors produced by the record store and the location source.
// The core crate translates these into its own taxonomy; consumers
// of the engine never see raw store failures.

use thiserror::Error;

/// Failures from the durable record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the requested site id.
    #[error("Site record not found: {site_id}")]
    NotFound { site_id: String },

    /// The conditional write's version guard did not match the stored
    /// record. The write was NOT applied. `stored_version` is what the
    /// store currently holds, so callers can decide whether to re-read.
    #[error("Version mismatch: write was based on a stale version (stored version is {stored_version})")]
    VersionMismatch { stored_version: u64 },

    /// A transient transport or storage hiccup. Safe to retry.
    #[error("Transient store failure: {message}")]
    Transient { message: String },

    /// The store is unreachable and retrying is pointless for now.
    #[error("Record store unavailable")]
    Unavailable,
}

impl StoreError {
    /// Whether a retry of the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }
}

/// Terminal failures from the location source.
///
/// Either of these ends the sample stream; the session degrades rather
/// than failing, and keeps reconciling on the last known sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location service unavailable")]
    ServiceUnavailable,
}
