// ── Site domain type ──
//
// The in-memory view of one registered place. This is a cache of the
// durable record: the registry keeps it in sync through the update
// coordinator, and nothing mutates it outside the per-site lock.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::geo::GeoPoint;

// ── SiteId ──────────────────────────────────────────────────────────

/// Owner-scoped unique identifier for a site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteId(String);

impl SiteId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SiteId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for SiteId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ── Status ──────────────────────────────────────────────────────────

/// Open/closed state of a place.
///
/// `Unknown` exists only before the first accepted decision; once a
/// site has been Open or Closed it never returns to Unknown.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Open,
    Closed,
    Unknown,
}

impl Status {
    /// The status a manual toggle lands on. Unknown toggles to Open:
    /// the owner pressing the button on a site that was never
    /// evaluated is announcing they are open.
    pub fn toggled(self) -> Status {
        match self {
            Status::Open => Status::Closed,
            Status::Closed | Status::Unknown => Status::Open,
        }
    }
}

// ── Site ────────────────────────────────────────────────────────────

/// One registered place with its current reconciliation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub center: GeoPoint,
    /// Circular geofence radius. Always > 0.
    pub radius_meters: f64,
    pub status: Status,
    /// While set, automatic evaluation never changes `status`.
    pub override_active: bool,
    pub last_change_at: DateTime<Utc>,
    /// Optimistic-concurrency token, mirrors the stored record.
    pub version: u64,
}
