// ── Core error types ──
//
// User-facing errors from shopsign-core. Store-level conditions that
// the coordinator absorbs (version conflicts, bounded transient
// failures) never appear here; callers only see direct API misuse
// and exhausted retry budgets.

use thiserror::Error;

use shopsign_api::StoreError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Caller contract violations ───────────────────────────────────
    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("Invalid radius: {meters} m (must be > 0)")]
    InvalidRadius { meters: f64 },

    #[error("Invalid accuracy threshold: {meters} m (must be > 0)")]
    InvalidAccuracy { meters: f64 },

    #[error("Unknown wire status: {value:?}")]
    UnknownStatus { value: String },

    #[error("Site not found: {site_id}")]
    SiteNotFound { site_id: String },

    // ── Session lifecycle ────────────────────────────────────────────
    #[error("Session is not active")]
    SessionNotActive,

    // ── Store interaction ────────────────────────────────────────────
    /// The retry budget ran out on a transient store failure. The
    /// intent was dropped; the next reconciliation pass self-heals.
    #[error("Store write failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// A non-retryable store failure that is not a version conflict
    /// (those are handled internally and never surfaced).
    #[error("Record store error: {0}")]
    Store(StoreError),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from boundary errors ──────────────────────────────────

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { site_id } => CoreError::SiteNotFound { site_id },
            other => CoreError::Store(other),
        }
    }
}
