//! Fixed-point geographic coordinates
//!
//! The market contract stores coordinates as integers scaled by 1e6 (six
//! decimal places), each fitting a signed 32-bit range. All conversion from
//! floating-point degrees happens here, before anything touches the chain.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Scale factor between degrees and the contract's fixed-point integers.
pub const COORD_SCALE: f64 = 1_000_000.0;

/// A discretized (lat, lon) pair in fixed-point 1e6 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude, 1e6 scale, range [-90_000_000, 90_000_000]
    pub lat_e6: i32,
    /// Longitude, 1e6 scale, range [-180_000_000, 180_000_000]
    pub lon_e6: i32,
}

impl GeoPoint {
    /// Build a point from floating-point degrees, rounding to 1e6 precision.
    ///
    /// Out-of-range inputs are configuration errors and fail before any
    /// network call is made.
    pub fn from_degrees(lat: f64, lon: f64) -> Result<Self, CoreError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CoreError::LatitudeOutOfRange(lat));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(CoreError::LongitudeOutOfRange(lon));
        }
        Ok(Self {
            lat_e6: (lat * COORD_SCALE).round() as i32,
            lon_e6: (lon * COORD_SCALE).round() as i32,
        })
    }

    /// Build a point from raw fixed-point values, validating range.
    pub fn from_e6(lat_e6: i32, lon_e6: i32) -> Result<Self, CoreError> {
        if lat_e6.abs() > 90_000_000 {
            return Err(CoreError::LatitudeOutOfRange(lat_e6 as f64 / COORD_SCALE));
        }
        if lon_e6.abs() > 180_000_000 {
            return Err(CoreError::LongitudeOutOfRange(lon_e6 as f64 / COORD_SCALE));
        }
        Ok(Self { lat_e6, lon_e6 })
    }

    /// Latitude in degrees.
    pub fn lat(&self) -> f64 {
        self.lat_e6 as f64 / COORD_SCALE
    }

    /// Longitude in degrees.
    pub fn lon(&self) -> f64 {
        self.lon_e6 as f64 / COORD_SCALE
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat(), self.lon())
    }
}
