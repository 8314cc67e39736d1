// ── Geographic primitives ──
//
// Validated coordinate pairs and great-circle distance. Spherical
// earth is fine at the radii this engine cares about (tens to
// hundreds of meters).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Mean earth radius, meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A validated geographic point.
///
/// Construction rejects out-of-range values, so any `GeoPoint` held
/// by the engine is known-good.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Build a point, rejecting latitudes outside [-90, 90] and
    /// longitudes outside [-180, 180]. NaN fails both comparisons
    /// and is rejected too.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoreError> {
        let lat_ok = (-90.0..=90.0).contains(&latitude);
        let lon_ok = (-180.0..=180.0).contains(&longitude);
        if lat_ok && lon_ok {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(CoreError::InvalidCoordinate {
                latitude,
                longitude,
            })
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Great-circle distance between two points in meters (haversine).
///
/// Deterministic and side-effect free; `distance_meters(p, p) == 0.0`.
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    EARTH_RADIUS_M * c
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn identical_points_are_zero_meters() {
        let p = GeoPoint::new(37.7749, -122.4194).unwrap();
        assert!(distance_meters(p, p).abs() < f64::EPSILON);
    }

    #[test]
    fn one_degree_latitude_is_about_111_km() {
        let a = GeoPoint::new(0.0, 0.0).unwrap();
        let b = GeoPoint::new(1.0, 0.0).unwrap();
        let d = distance_meters(a, b);
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn short_hop_north_of_market_street() {
        // ~551 m due north of the reference storefront.
        let center = GeoPoint::new(37.7749, -122.4194).unwrap();
        let nearby = GeoPoint::new(37.77944, -122.4194).unwrap();
        let d = distance_meters(center, nearby);
        assert!((d - 551.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint::new(52.52, 13.405).unwrap();
        let b = GeoPoint::new(48.8566, 2.3522).unwrap();
        let d1 = distance_meters(a, b);
        let d2 = distance_meters(b, a);
        assert!((d1 - d2).abs() < 1e-6);
        // Berlin to Paris, ~878 km.
        assert!((d1 - 878_000.0).abs() < 10_000.0, "got {d1}");
    }

    #[test]
    fn rejects_out_of_range_latitude() {
        assert!(matches!(
            GeoPoint::new(90.1, 0.0),
            Err(CoreError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            GeoPoint::new(-91.0, 0.0),
            Err(CoreError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_longitude() {
        assert!(GeoPoint::new(0.0, 180.1).is_err());
        assert!(GeoPoint::new(0.0, -200.0).is_err());
    }

    #[test]
    fn rejects_nan() {
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn boundary_values_are_accepted() {
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
    }
}
