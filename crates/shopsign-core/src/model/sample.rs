// ── Location sample ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// A validated device location sample.
///
/// Built from a raw [`shopsign_api::LocationFix`] at the boundary;
/// the session retains only the single most recent trusted sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationSample {
    pub point: GeoPoint,
    /// Estimated horizontal error radius, meters.
    pub accuracy_meters: f64,
    pub observed_at: DateTime<Utc>,
}
