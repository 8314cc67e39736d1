// ── Wire-level site records ──
//
// The shapes the record store reads and writes. Statuses travel as
// strings here; the core crate owns the closed enum and validates on
// conversion. Coordinates are raw f64 pairs for the same reason.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A site as stored durably, one record per registered place.
///
/// `version` is the optimistic-concurrency token: every accepted
/// status mutation bumps it by exactly one, and conditional writes
/// are rejected unless their guard matches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteRecord {
    pub id: String,
    pub owner_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    /// Wire status: `"OPEN"`, `"CLOSED"`, or `"UNKNOWN"`.
    pub status: String,
    pub override_active: bool,
    pub version: u64,
    pub last_change_at: DateTime<Utc>,
}

/// A conditional status write against a single site record.
///
/// Applied only if the stored version equals `based_on_version`; on
/// success the store sets `version = based_on_version + 1`. Geometry
/// fields are never touched by a status write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusWrite {
    /// Wire status: `"OPEN"`, `"CLOSED"`, or `"UNKNOWN"`.
    pub status: String,
    pub override_active: bool,
    pub based_on_version: u64,
    pub changed_at: DateTime<Utc>,
}
