//! Geofence Validation
//!
//! This module decides whether a position lies inside an authorized zone.
//! Geofences are circular zones (center + radius) loaded from an external
//! location registry and never modified by the engine.
//!
//! The validator owns geometry only. Radius policy belongs to the call
//! site: use [`Geofence::with_radius`] to apply the attendance or
//! checkpoint radius to a registry fence.
//!
//! # Features
//!
//! - Inclusive boundary: a point exactly on the radius is inside
//! - Nearest-fence search across several candidate zones
//!
//! # Example
//!
//! ```rust
//! use geotrust_core::geo::Coordinate;
//! use geotrust_core::geofence::{check_point, Geofence};
//!
//! let office = Geofence::new("office", Coordinate::new(-6.2, 106.8167).unwrap(), 60.0);
//! let here = Coordinate::new(-6.20045, 106.8167).unwrap();
//!
//! let check = check_point(here, &office);
//! assert!(check.within_radius);
//! ```

mod validator;

pub use validator::*;
