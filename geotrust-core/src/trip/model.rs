use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::geo::{distance_meters, path_length, Coordinate};

/// Allowed drift between a stored total and its recomputation, for records
/// that passed through a lossy transport
const TOTAL_TOLERANCE_METERS: f64 = 1e-6;

/// Lifecycle status of a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    #[default]
    Created,
    Started,
    /// Terminal
    Ended,
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TripStatus::Created => "created",
            TripStatus::Started => "started",
            TripStatus::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// Who a trip belongs to. At most one started trip per owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripOwner {
    pub actor_id: String,
    pub day: NaiveDate,
}

impl TripOwner {
    pub fn new(actor_id: impl Into<String>, day: NaiveDate) -> Self {
        TripOwner {
            actor_id: actor_id.into(),
            day,
        }
    }
}

/// A geofence-validated waypoint. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub sequence: u32,
    pub coordinate: Coordinate,
    pub timestamp_ms: u64,
    pub distance_from_previous_meters: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub owner: TripOwner,
    pub status: TripStatus,
    /// Origin first, strictly increasing sequence
    pub checkpoints: Vec<Checkpoint>,
    pub total_distance_meters: f64,
}

impl Trip {
    pub fn new(id: impl Into<String>, owner: TripOwner) -> Self {
        Trip {
            id: id.into(),
            owner,
            status: TripStatus::Created,
            checkpoints: Vec::new(),
            total_distance_meters: 0.0,
        }
    }

    pub fn origin(&self) -> Option<&Checkpoint> {
        self.checkpoints.first()
    }

    pub fn last_checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }

    pub fn is_started(&self) -> bool {
        self.status == TripStatus::Started
    }

    pub fn is_ended(&self) -> bool {
        self.status == TripStatus::Ended
    }

    /// Sum of pairwise distances between consecutive stored checkpoints,
    /// computed from scratch
    pub fn recompute_total_distance(&self) -> f64 {
        path_length(self.checkpoints.iter().map(|c| &c.coordinate))
    }

    /// Check a record (typically reloaded from storage) is internally consistent
    pub fn verify_integrity(&self) -> EngineResult<()> {
        let fail = |msg: String| Err(EngineError::input(format!("trip {}: {}", self.id, msg)));

        match self.status {
            TripStatus::Created if !self.checkpoints.is_empty() => {
                return fail("created trip must not have checkpoints".to_string());
            }
            TripStatus::Started | TripStatus::Ended if self.checkpoints.is_empty() => {
                return fail(format!("{} trip has no origin", self.status));
            }
            _ => {}
        }

        let mut prev: Option<&Checkpoint> = None;
        for (index, cp) in self.checkpoints.iter().enumerate() {
            cp.coordinate.validate()?;
            if cp.sequence as usize != index {
                return fail(format!(
                    "checkpoint at position {} has sequence {}",
                    index, cp.sequence
                ));
            }
            let expected = match prev {
                Some(p) => {
                    if cp.timestamp_ms < p.timestamp_ms {
                        return fail(format!("checkpoint {} goes back in time", cp.sequence));
                    }
                    distance_meters(p.coordinate, cp.coordinate)
                }
                None => 0.0,
            };
            if (cp.distance_from_previous_meters - expected).abs() > TOTAL_TOLERANCE_METERS {
                return fail(format!(
                    "checkpoint {} records {} m from previous, expected {} m",
                    cp.sequence, cp.distance_from_previous_meters, expected
                ));
            }
            prev = Some(cp);
        }

        let recomputed = self.recompute_total_distance();
        if (self.total_distance_meters - recomputed).abs() > TOTAL_TOLERANCE_METERS {
            return fail(format!(
                "total distance {} m does not match recomputed {} m",
                self.total_distance_meters, recomputed
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> TripOwner {
        TripOwner::new("emp-1", NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())
    }

    fn cp(sequence: u32, lat: f64, t: u64, from_prev: f64) -> Checkpoint {
        Checkpoint {
            sequence,
            coordinate: Coordinate {
                latitude: lat,
                longitude: 106.8167,
            },
            timestamp_ms: t,
            distance_from_previous_meters: from_prev,
            label: format!("cp{}", sequence),
        }
    }

    fn valid_trip() -> Trip {
        let a = Coordinate {
            latitude: -6.2,
            longitude: 106.8167,
        };
        let b = Coordinate {
            latitude: -6.2004,
            longitude: 106.8167,
        };
        let d = distance_meters(a, b);
        let mut trip = Trip::new("t1", owner());
        trip.status = TripStatus::Started;
        trip.checkpoints = vec![cp(0, -6.2, 0, 0.0), cp(1, -6.2004, 1_000, d)];
        trip.total_distance_meters = d;
        trip
    }

    #[test]
    fn test_new_trip_is_created() {
        let trip = Trip::new("t1", owner());
        assert_eq!(trip.status, TripStatus::Created);
        assert!(trip.origin().is_none());
        assert_eq!(trip.recompute_total_distance(), 0.0);
        assert!(trip.verify_integrity().is_ok());
    }

    #[test]
    fn test_valid_trip_passes() {
        assert!(valid_trip().verify_integrity().is_ok());
    }

    #[test]
    fn test_integrity_catches_bad_total() {
        let mut trip = valid_trip();
        trip.total_distance_meters += 1.0;
        assert!(trip.verify_integrity().is_err());
    }

    #[test]
    fn test_integrity_catches_bad_sequence() {
        let mut trip = valid_trip();
        trip.checkpoints[1].sequence = 5;
        assert!(trip.verify_integrity().is_err());
    }

    #[test]
    fn test_integrity_catches_time_travel() {
        let mut trip = valid_trip();
        trip.checkpoints[0].timestamp_ms = 5_000;
        assert!(trip.verify_integrity().is_err());
    }

    #[test]
    fn test_integrity_catches_missing_origin() {
        let mut trip = Trip::new("t1", owner());
        trip.status = TripStatus::Ended;
        assert!(trip.verify_integrity().is_err());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&TripStatus::Started).unwrap(), "\"started\"");
        assert_eq!(TripStatus::Ended.to_string(), "ended");
    }
}
