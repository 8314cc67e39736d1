// ── Reconciliation engine ──
//
// Pure decision functions: given one site and one location, what (if
// anything) should change. All functions here are synchronous and
// side-effect free; the session calls them while holding the site's
// slot lock, and the coordinator turns the returned intents into
// version-guarded writes.

use tracing::trace;

use crate::geo::{GeoPoint, distance_meters};
use crate::model::{ChangeCause, LocationSample, Site, Status, StatusIntent};

/// Decide whether an automatic status change is warranted.
///
/// Returns `None` when the override is pinned or the site is already
/// in the desired status (idempotence — no redundant writes). The
/// boundary is inclusive: `d <= radius` is Open. There is no
/// hysteresis band; a sample oscillating across the boundary will
/// produce a transition per crossing.
pub fn evaluate(site: &Site, location: GeoPoint) -> Option<StatusIntent> {
    if site.override_active {
        return None;
    }

    let d = distance_meters(site.center, location);
    let desired = if d <= site.radius_meters {
        Status::Open
    } else {
        Status::Closed
    };

    trace!(
        site_id = %site.id,
        distance_m = d,
        radius_m = site.radius_meters,
        current = %site.status,
        desired = %desired,
        "evaluated proximity"
    );

    if desired == site.status {
        return None;
    }

    Some(StatusIntent::new(
        site.id.clone(),
        site.status,
        desired,
        ChangeCause::Automatic,
        site.version,
    ))
}

/// Plan a manual toggle. Always produces an intent — an explicit user
/// action is never a no-op — and committing it pins the override.
pub fn plan_toggle(site: &Site) -> StatusIntent {
    StatusIntent::new(
        site.id.clone(),
        site.status,
        site.status.toggled(),
        ChangeCause::Manual,
        site.version,
    )
}

/// Plan an override clear.
///
/// Always produces an intent, even when the status itself does not
/// change, because the cleared flag must reach the store. With a
/// known location the site converges straight to its automatic
/// status; without one the status is left as-is and the next trusted
/// sample or timer pass converges it.
pub fn plan_clear_override(site: &Site, last_known: Option<GeoPoint>) -> StatusIntent {
    let to_status = match last_known {
        Some(location) => {
            let d = distance_meters(site.center, location);
            if d <= site.radius_meters {
                Status::Open
            } else {
                Status::Closed
            }
        }
        None => site.status,
    };

    // Automatic cause: the commit clears the override flag.
    StatusIntent::new(
        site.id.clone(),
        site.status,
        to_status,
        ChangeCause::Automatic,
        site.version,
    )
}

/// Accuracy gate for incoming samples. A sample whose reported error
/// radius exceeds the configured threshold is too coarse to act on.
pub fn sample_trusted(sample: &LocationSample, max_accuracy_meters: f64) -> bool {
    sample.accuracy_meters <= max_accuracy_meters
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::SiteId;

    fn site(status: Status, override_active: bool) -> Site {
        Site {
            id: SiteId::new("site-a"),
            center: GeoPoint::new(37.7749, -122.4194).unwrap(),
            radius_meters: 50.0,
            status,
            override_active,
            last_change_at: Utc::now(),
            version: 3,
        }
    }

    fn at_center() -> GeoPoint {
        GeoPoint::new(37.7749, -122.4194).unwrap()
    }

    fn far_away() -> GeoPoint {
        // ~551 m north of the center.
        GeoPoint::new(37.77944, -122.4194).unwrap()
    }

    #[test]
    fn inside_radius_opens_an_unknown_site() {
        let intent = evaluate(&site(Status::Unknown, false), at_center()).unwrap();
        assert_eq!(intent.to_status, Status::Open);
        assert_eq!(intent.from_status, Status::Unknown);
        assert_eq!(intent.cause, ChangeCause::Automatic);
        assert_eq!(intent.based_on_version, 3);
        assert!(!intent.override_active);
    }

    #[test]
    fn outside_radius_closes() {
        let intent = evaluate(&site(Status::Open, false), far_away()).unwrap();
        assert_eq!(intent.to_status, Status::Closed);
    }

    #[test]
    fn matching_status_is_a_no_op() {
        assert!(evaluate(&site(Status::Open, false), at_center()).is_none());
        assert!(evaluate(&site(Status::Closed, false), far_away()).is_none());
    }

    #[test]
    fn active_override_suppresses_evaluation() {
        // 551 m away and Open: without the override this would close.
        assert!(evaluate(&site(Status::Open, true), far_away()).is_none());
    }

    #[test]
    fn boundary_distance_is_inclusive() {
        let mut s = site(Status::Closed, false);
        let probe = far_away();
        s.radius_meters = distance_meters(s.center, probe);
        let intent = evaluate(&s, probe).unwrap();
        assert_eq!(intent.to_status, Status::Open);
    }

    #[test]
    fn toggle_always_produces_a_manual_intent() {
        let intent = plan_toggle(&site(Status::Closed, false));
        assert_eq!(intent.to_status, Status::Open);
        assert_eq!(intent.cause, ChangeCause::Manual);
        assert!(intent.override_active);

        // Even when the flip lands on the same side a fresh evaluation
        // would pick — the user asked, so an intent is produced.
        let again = plan_toggle(&site(Status::Open, true));
        assert_eq!(again.to_status, Status::Closed);
    }

    #[test]
    fn clear_override_with_location_converges() {
        let intent = plan_clear_override(&site(Status::Open, true), Some(far_away()));
        assert_eq!(intent.to_status, Status::Closed);
        assert!(!intent.override_active);
        assert_eq!(intent.cause, ChangeCause::Automatic);
    }

    #[test]
    fn clear_override_without_location_keeps_status() {
        let intent = plan_clear_override(&site(Status::Open, true), None);
        assert_eq!(intent.to_status, Status::Open);
        assert!(!intent.override_active);
    }

    #[test]
    fn accuracy_gate_rejects_coarse_samples() {
        let sample = LocationSample {
            point: at_center(),
            accuracy_meters: 120.0,
            observed_at: Utc::now(),
        };
        assert!(!sample_trusted(&sample, 100.0));
        assert!(sample_trusted(&sample, 120.0));
    }
}
