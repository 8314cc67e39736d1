// ── Location source contract ──
//
// The location source is push-based: whoever owns the platform
// location APIs feeds `SourceEvent`s into an mpsc channel and hands
// the receiver to the monitoring session. The source may end the
// stream with a terminal error; that degrades the session, it does
// not kill it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::SourceError;

/// Default buffer for location channels created via [`channel`].
pub const LOCATION_CHANNEL_SIZE: usize = 32;

/// A raw device location fix as delivered by the platform.
///
/// Untrusted input: the engine validates ranges and applies its own
/// accuracy gate before acting on a fix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Estimated horizontal error radius, in meters.
    pub accuracy_meters: f64,
    pub observed_at: DateTime<Utc>,
}

/// One event on the location stream.
#[derive(Debug, Clone, Copy)]
pub enum SourceEvent {
    /// A new location fix arrived.
    Fix(LocationFix),
    /// The source terminated. No further fixes will arrive until the
    /// collaborator resumes the subscription with a fresh channel.
    Ended(SourceError),
}

/// Create a location channel with the default buffer size.
pub fn channel() -> (mpsc::Sender<SourceEvent>, mpsc::Receiver<SourceEvent>) {
    mpsc::channel(LOCATION_CHANNEL_SIZE)
}
