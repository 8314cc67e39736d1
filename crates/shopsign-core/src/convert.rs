// ── Boundary conversions ──
//
// Wire records carry raw f64 pairs and stringly statuses; everything
// is validated here, once, so the rest of the crate only ever sees
// the closed domain types.

use chrono::Utc;

use shopsign_api::{LocationFix, SiteRecord, StatusWrite};

use crate::error::CoreError;
use crate::geo::GeoPoint;
use crate::model::{LocationSample, Site, SiteId, Status, StatusIntent};

/// Parse a wire status string into the closed enum.
pub fn status_from_wire(value: &str) -> Result<Status, CoreError> {
    value.parse().map_err(|_| CoreError::UnknownStatus {
        value: value.to_owned(),
    })
}

/// Validate a stored record into a domain `Site`.
///
/// Rejects out-of-range coordinates, non-positive radii, and unknown
/// status strings — a record that fails here is a data corruption
/// problem, not something to limp along with.
pub fn site_from_record(record: &SiteRecord) -> Result<Site, CoreError> {
    let center = GeoPoint::new(record.latitude, record.longitude)?;
    if record.radius_meters <= 0.0 || !record.radius_meters.is_finite() {
        return Err(CoreError::InvalidRadius {
            meters: record.radius_meters,
        });
    }
    Ok(Site {
        id: SiteId::new(record.id.clone()),
        center,
        radius_meters: record.radius_meters,
        status: status_from_wire(&record.status)?,
        override_active: record.override_active,
        last_change_at: record.last_change_at,
        version: record.version,
    })
}

/// Validate a raw location fix into a domain sample.
pub fn sample_from_fix(fix: &LocationFix) -> Result<LocationSample, CoreError> {
    let point = GeoPoint::new(fix.latitude, fix.longitude)?;
    if fix.accuracy_meters < 0.0 || !fix.accuracy_meters.is_finite() {
        return Err(CoreError::InvalidAccuracy {
            meters: fix.accuracy_meters,
        });
    }
    Ok(LocationSample {
        point,
        accuracy_meters: fix.accuracy_meters,
        observed_at: fix.observed_at,
    })
}

/// Build the conditional write for an intent.
pub fn write_from_intent(intent: &StatusIntent) -> StatusWrite {
    StatusWrite {
        status: intent.to_status.to_string(),
        override_active: intent.override_active,
        based_on_version: intent.based_on_version,
        changed_at: Utc::now(),
    }
}
