//! Attendance Check-in/out Guard
//!
//! One-shot decisions combining the geofence test with the trust verdict
//! of the session's [`PositionStreamAnalyzer`](crate::trust::PositionStreamAnalyzer).
//!
//! Enforcement is configuration, not code: with `enforce_trust` off the
//! trust verdict is advisory (logged and returned, never blocking), and with
//! `enforce_radius` off the radius result is advisory as well.

mod guard;

pub use guard::*;
