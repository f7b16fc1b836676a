//! Trip Tracking
//!
//! A trip is a Start / Checkpoint* / End sequence of geofence-validated
//! waypoints with a running total of travelled distance.
//!
//! # Architecture
//!
//! - **model**: `Trip`, `Checkpoint`, `TripStatus`, `TripOwner`
//! - **machine**: `TripStateMachine`, the lifecycle rules and single-flight guard
//! - **repository**: `TripRepository` seam and an in-memory implementation
//! - **service**: `TripService`, which persists every transition before applying it
//!
//! # State Machine
//!
//! ```text
//! Idle ──start──▶ Started ──add_checkpoint──▶ Started ──end──▶ Ended
//! ```
//!
//! Mutations are two-phase. `prepare_*` computes the complete next state and
//! locks the trip; `commit` applies it, `abort` drops it. A second mutation
//! on a locked trip fails with `ConcurrentModification`. A rejected
//! checkpoint leaves the trip untouched.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use geotrust_core::geo::Coordinate;
//! use geotrust_core::geofence::Geofence;
//! use geotrust_core::trip::{TripOwner, TripStateMachine};
//!
//! let mut trips = TripStateMachine::new();
//! let owner = TripOwner::new("emp-7", NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
//! let origin = Coordinate::new(-6.2, 106.8167).unwrap();
//!
//! trips.start("trip-1", owner, origin, "office", 0).unwrap();
//!
//! let fence = Geofence::new("client-a", origin, 60.0);
//! let next = Coordinate::new(-6.20045, 106.8167).unwrap();
//! let trip = trips.add_checkpoint("trip-1", next, &fence, "client A", 60_000).unwrap();
//!
//! assert_eq!(trip.checkpoints.len(), 2);
//! assert!((trip.total_distance_meters - 50.0).abs() < 1.0);
//! ```

mod machine;
mod model;
mod repository;
mod service;

pub use machine::{PendingTransition, TransitionKind, TripStateMachine};
pub use model::{Checkpoint, Trip, TripOwner, TripStatus};
pub use repository::{MemoryTripRepository, TripRepository};
pub use service::TripService;
