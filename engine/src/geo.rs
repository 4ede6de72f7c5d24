//! Great-circle distance between coordinates.
//!
//! Pure functions, no state. Discovery uses [`BoundingBox`] as a cheap
//! prefilter and [`distance_km`] for the exact figure.

use crate::types::Coordinate;
use std::f64::consts::FRAC_PI_2;

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Slack added to bounding boxes so rounding never drops a point that
/// lies exactly on the search radius.
const BOX_EPSILON_DEG: f64 = 1e-9;

/// Haversine distance between two coordinates in kilometres.
///
/// Symmetric, never negative, and exactly zero for identical coordinates.
#[must_use]
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude().to_radians();
    let lat_b = b.latitude().to_radians();
    let delta_lat = lat_b - lat_a;
    let delta_lon = (b.longitude() - a.longitude()).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (delta_lon / 2.0).sin().powi(2);

    // h can exceed 1.0 by an ulp for antipodal points
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Whether `b` lies within `max_km` of `a`
#[must_use]
pub fn within_km(a: Coordinate, b: Coordinate, max_km: f64) -> bool {
    distance_km(a, b) <= max_km
}

/// Latitude/longitude rectangle that contains every point within a radius.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    min_lat: f64,
    max_lat: f64,
    center_lon: f64,
    /// Half the longitudinal width in degrees; `None` when the box spans all longitudes
    half_width_lon: Option<f64>,
}

impl BoundingBox {
    /// Box around `center` covering every point within `radius_km`
    #[must_use]
    pub fn around(center: Coordinate, radius_km: f64) -> Self {
        let angular = radius_km / EARTH_RADIUS_KM;
        let lat = center.latitude().to_radians();
        let min_lat = lat - angular;
        let max_lat = lat + angular;

        if min_lat <= -FRAC_PI_2 || max_lat >= FRAC_PI_2 {
            // Covers a pole: every longitude is reachable
            return Self {
                min_lat: min_lat.max(-FRAC_PI_2).to_degrees(),
                max_lat: max_lat.min(FRAC_PI_2).to_degrees(),
                center_lon: center.longitude(),
                half_width_lon: None,
            };
        }

        let delta_lon = (angular.sin() / lat.cos()).asin().to_degrees();
        Self {
            min_lat: min_lat.to_degrees(),
            max_lat: max_lat.to_degrees(),
            center_lon: center.longitude(),
            half_width_lon: (delta_lon < 180.0).then_some(delta_lon),
        }
    }

    /// Whether `point` falls inside the box
    #[must_use]
    pub fn contains(&self, point: Coordinate) -> bool {
        let lat = point.latitude();
        if lat < self.min_lat - BOX_EPSILON_DEG || lat > self.max_lat + BOX_EPSILON_DEG {
            return false;
        }

        self.half_width_lon.is_none_or(|half_width| {
            longitude_gap(self.center_lon, point.longitude()) <= half_width + BOX_EPSILON_DEG
        })
    }
}

/// Absolute longitudinal separation in degrees, accounting for the antimeridian
fn longitude_gap(a: f64, b: f64) -> f64 {
    let gap = (a - b).abs() % 360.0;
    if gap > 180.0 { 360.0 - gap } else { gap }
}
