//! Geofence Envelope
//!
//! Circular horizontal boundary plus altitude band within which flight
//! commands are authorized. Immutable after construction.

use thiserror::Error;

/// Mean Earth radius used for great-circle distance, in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Errors raised when constructing a geofence with broken invariants
#[derive(Error, Debug, PartialEq)]
pub enum GeofenceError {
    #[error("geofence radius must be positive (got {0}m)")]
    NonPositiveRadius(f64),

    #[error("geofence altitude band is inverted (min {min}m > max {max}m)")]
    InvertedAltitudeBand { min: f64, max: f64 },
}

/// Immutable spatial and altitude bounds for authorized flight.
///
/// Invariants enforced at construction: `radius_m > 0` and
/// `min_altitude_m <= max_altitude_m`.
#[derive(Debug, Clone, PartialEq)]
pub struct Geofence {
    center_lat: f64,
    center_lon: f64,
    radius_m: f64,
    max_altitude_m: f64,
    min_altitude_m: f64,
}

impl Geofence {
    pub fn new(
        center_lat: f64,
        center_lon: f64,
        radius_m: f64,
        max_altitude_m: f64,
        min_altitude_m: f64,
    ) -> Result<Self, GeofenceError> {
        if !(radius_m > 0.0) {
            return Err(GeofenceError::NonPositiveRadius(radius_m));
        }
        if min_altitude_m > max_altitude_m {
            return Err(GeofenceError::InvertedAltitudeBand {
                min: min_altitude_m,
                max: max_altitude_m,
            });
        }

        Ok(Self {
            center_lat,
            center_lon,
            radius_m,
            max_altitude_m,
            min_altitude_m,
        })
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    pub fn min_altitude_m(&self) -> f64 {
        self.min_altitude_m
    }

    pub fn max_altitude_m(&self) -> f64 {
        self.max_altitude_m
    }

    /// Inclusive altitude band check
    pub fn altitude_within(&self, alt: f64) -> bool {
        alt >= self.min_altitude_m && alt <= self.max_altitude_m
    }

    /// Great-circle distance from the fence center to a target, in meters
    pub fn distance_from_center_m(&self, lat: f64, lon: f64) -> f64 {
        haversine_m(self.center_lat, self.center_lon, lat, lon)
    }

    /// True if the horizontal target lies within the authorized radius
    /// (boundary inclusive)
    pub fn contains_horizontal(&self, lat: f64, lon: f64) -> bool {
        self.distance_from_center_m(lat, lon) <= self.radius_m
    }
}

/// Haversine great-circle distance between two lat/lon pairs, in meters
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    EARTH_RADIUS_M * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}
