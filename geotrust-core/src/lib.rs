//! Location Trust & Geofence Verification Engine
//!
//! Platform-independent core for location-bound attendance and trip
//! tracking. The engine transforms position samples and authorization
//! state; it never renders, talks to the network or calls device APIs.
//!
//! # Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`geo`] | Coordinates, samples, haversine distance |
//! | [`geofence`] | Point-in-radius checks against one or many zones |
//! | [`trust`] | Stateful anti-spoof analysis of a sample stream |
//! | [`trip`] | Start / Checkpoint / End trip state machine and persistence seam |
//! | [`attendance`] | One-shot check-in/out decisions |
//! | [`config`] | Deployment policy and thresholds |
//!
//! # Threading
//!
//! Everything is synchronous and push-driven. Pure functions in `geo` and
//! `geofence` can be called from anywhere; analyzers and trip machines hold
//! session state and expect `&mut` access from their owner.

pub mod attendance;
pub mod config;
pub mod error;
pub mod geo;
pub mod geofence;
pub mod trip;
pub mod trust;

pub use attendance::{AttendanceDecision, AttendanceGeoCheck, AttendanceRadiusGuard, GuardOptions};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, RepositoryError};
pub use geo::{distance_meters, Coordinate, PositionSample};
pub use geofence::{check_against_multiple, check_point, Geofence};
pub use trip::{Checkpoint, Trip, TripOwner, TripService, TripStateMachine, TripStatus};
pub use trust::{PositionStreamAnalyzer, TrustAssessment, TrustReason};
