use std::collections::HashMap;

use crate::error::RepositoryError;

use super::model::Trip;

/// Storage for trip records.
///
/// The engine hands over every trip state before applying it and only ever
/// needs to reload a trip by id to resume a session. Transport retries are
/// the implementation's business.
pub trait TripRepository {
    fn save(&mut self, trip: &Trip) -> Result<(), RepositoryError>;

    fn load(&self, trip_id: &str) -> Result<Trip, RepositoryError>;
}

/// In-memory repository keeping bincode-encoded snapshots.
///
/// Encoding on save means a reloaded trip is a decoded copy, as it would be
/// from a real backend.
#[derive(Debug, Default)]
pub struct MemoryTripRepository {
    records: HashMap<String, Vec<u8>>,
    save_count: u64,
}

impl MemoryTripRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of successful saves since creation
    pub fn save_count(&self) -> u64 {
        self.save_count
    }
}

impl TripRepository for MemoryTripRepository {
    fn save(&mut self, trip: &Trip) -> Result<(), RepositoryError> {
        let bytes = bincode::serialize(trip)?;
        self.records.insert(trip.id.clone(), bytes);
        self.save_count += 1;
        Ok(())
    }

    fn load(&self, trip_id: &str) -> Result<Trip, RepositoryError> {
        let bytes = self
            .records
            .get(trip_id)
            .ok_or_else(|| RepositoryError::NotFound(trip_id.to_string()))?;
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::trip::{Checkpoint, TripOwner, TripStatus};
    use chrono::NaiveDate;

    #[test]
    fn test_save_and_load() {
        let mut repo = MemoryTripRepository::new();
        let mut trip = Trip::new(
            "t1",
            TripOwner::new("emp-1", NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()),
        );
        trip.status = TripStatus::Started;
        trip.checkpoints.push(Checkpoint {
            sequence: 0,
            coordinate: Coordinate {
                latitude: -6.2,
                longitude: 106.8167,
            },
            timestamp_ms: 1_700_000_000_000,
            distance_from_previous_meters: 0.0,
            label: "office".to_string(),
        });

        repo.save(&trip).unwrap();
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.save_count(), 1);
        assert_eq!(repo.load("t1").unwrap(), trip);
    }

    #[test]
    fn test_load_missing() {
        let repo = MemoryTripRepository::new();
        assert_eq!(
            repo.load("ghost"),
            Err(RepositoryError::NotFound("ghost".to_string()))
        );
    }
}
