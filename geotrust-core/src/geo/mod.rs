//! Coordinates, Position Samples and Great-Circle Distance
//!
//! All distances are computed with the haversine formula on a sphere of
//! radius [`EARTH_RADIUS_METERS`]. Coordinates are WGS84 degrees.
//!
//! # Example
//!
//! ```rust
//! use geotrust_core::geo::{distance_meters, Coordinate};
//!
//! let jakarta = Coordinate::new(-6.2000, 106.8167).unwrap();
//! let bandung = Coordinate::new(-6.9175, 107.6191).unwrap();
//!
//! let d = distance_meters(jakarta, bandung);
//! assert!((d - 118_000.0).abs() < 2_000.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

mod sample;

pub use sample::PositionSample;

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A WGS84 position in degrees.
///
/// Construct with [`Coordinate::new`] to have the ranges checked.
/// Deserialized values are checked by the operations that consume them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting non-finite or out-of-range values
    pub fn new(latitude: f64, longitude: f64) -> EngineResult<Self> {
        let c = Coordinate {
            latitude,
            longitude,
        };
        c.validate()?;
        Ok(c)
    }

    /// Check that −90 ≤ latitude ≤ 90 and −180 ≤ longitude ≤ 180
    pub fn validate(&self) -> EngineResult<()> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(EngineError::input(format!(
                "coordinate ({}, {}) is not finite",
                self.latitude, self.longitude
            )));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(EngineError::input(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(EngineError::input(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Bit-for-bit equality, used to spot frozen position feeds
    pub fn bit_identical(&self, other: &Coordinate) -> bool {
        self.latitude.to_bits() == other.latitude.to_bits()
            && self.longitude.to_bits() == other.longitude.to_bits()
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Great-circle distance in meters between two coordinates.
///
/// Symmetric, zero for identical points, never negative. A non-finite
/// component yields 0.0 (see [`distance_between`]).
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    distance_between(Some(a), Some(b))
}

/// Distance tolerant of missing input: returns 0.0 when either side is
/// absent or carries a non-finite component.
pub fn distance_between(a: Option<Coordinate>, b: Option<Coordinate>) -> f64 {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return 0.0,
    };
    if ![a.latitude, a.longitude, b.latitude, b.longitude]
        .iter()
        .all(|v| v.is_finite())
    {
        return 0.0;
    }

    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push h just outside [0, 1] near antipodes
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Strict distance: both coordinates must be valid
pub fn checked_distance(a: Coordinate, b: Coordinate) -> EngineResult<f64> {
    a.validate()?;
    b.validate()?;
    Ok(distance_meters(a, b))
}

/// Sum of distances between consecutive points
pub fn path_length<'a, I>(points: I) -> f64
where
    I: IntoIterator<Item = &'a Coordinate>,
{
    let mut total = 0.0;
    let mut prev: Option<Coordinate> = None;
    for p in points {
        if let Some(q) = prev {
            total += distance_meters(q, *p);
        }
        prev = Some(*p);
    }
    total
}
