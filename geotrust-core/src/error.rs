//! Engine Error Types
//!
//! Every fallible engine operation returns [`EngineResult`]. The variants map
//! one-to-one onto the conditions a caller must act on: malformed input,
//! a position outside the authorized zone, trip lifecycle violations,
//! concurrent mutation attempts and an interrupted location stream.

use thiserror::Error;

use crate::trip::TripStatus;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Malformed coordinate, sample or configuration value
    #[error("invalid input: {0}")]
    Input(String),

    /// Candidate position lies outside the target geofence
    #[error(
        "position is {distance_meters:.1} m from geofence {geofence_id}, outside radius of {radius_meters:.1} m"
    )]
    OutOfRange {
        distance_meters: f64,
        radius_meters: f64,
        geofence_id: String,
    },

    /// The actor already has a started trip for the day
    #[error("actor {actor_id} already has trip {existing_trip_id} started on {day}")]
    DuplicateTrip {
        actor_id: String,
        day: chrono::NaiveDate,
        existing_trip_id: String,
    },

    /// Operation is illegal for the trip's current status
    #[error("cannot {operation} trip {trip_id} while it is {status}")]
    InvalidState {
        trip_id: String,
        status: TripStatus,
        operation: &'static str,
    },

    /// Another mutation of the same trip is still pending
    #[error("trip {trip_id} already has a pending mutation")]
    ConcurrentModification { trip_id: String },

    /// The location stream stopped delivering samples
    #[error("location signal lost{}", silence_suffix(.silent_for_ms))]
    SignalLost { silent_for_ms: Option<u64> },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn silence_suffix(silent_for_ms: &Option<u64>) -> String {
    match silent_for_ms {
        Some(ms) => format!(" (no sample for {} ms)", ms),
        None => String::new(),
    }
}

impl EngineError {
    pub(crate) fn input(msg: impl Into<String>) -> Self {
        EngineError::Input(msg.into())
    }

    pub fn is_out_of_range(&self) -> bool {
        matches!(self, EngineError::OutOfRange { .. })
    }

    /// Distance carried by an `OutOfRange` error
    pub fn distance_meters(&self) -> Option<f64> {
        match self {
            EngineError::OutOfRange { distance_meters, .. } => Some(*distance_meters),
            _ => None,
        }
    }

    /// True for conditions that must stop the location-bound action.
    ///
    /// Repository failures are transport problems; the caller may retry them.
    pub fn blocks_action(&self) -> bool {
        !matches!(self, EngineError::Repository(_))
    }
}

/// Failures reported by a [`TripRepository`](crate::trip::TripRepository)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("trip {0} not found")]
    NotFound(String),

    #[error("trip record could not be encoded or decoded: {0}")]
    Codec(String),

    #[error("repository backend failure: {0}")]
    Backend(String),
}

impl From<bincode::Error> for RepositoryError {
    fn from(e: bincode::Error) -> Self {
        RepositoryError::Codec(e.to_string())
    }
}
