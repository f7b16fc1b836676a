use crate::config::TripPolicy;
use crate::error::EngineResult;
use crate::geo::Coordinate;
use crate::geofence::Geofence;

use super::machine::{PendingTransition, TripStateMachine};
use super::model::{Trip, TripOwner};
use super::repository::TripRepository;

/// Trip operations backed by a repository.
///
/// Each transition is saved before it is applied. If the save fails the
/// transition is aborted and the in-memory trip stays as it was.
pub struct TripService<R: TripRepository> {
    machine: TripStateMachine,
    repository: R,
    policy: TripPolicy,
}

impl<R: TripRepository> TripService<R> {
    pub fn new(repository: R, policy: TripPolicy) -> Self {
        TripService {
            machine: TripStateMachine::new(),
            repository,
            policy,
        }
    }

    pub fn machine(&self) -> &TripStateMachine {
        &self.machine
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn policy(&self) -> &TripPolicy {
        &self.policy
    }

    pub fn trip(&self, trip_id: &str) -> Option<&Trip> {
        self.machine.trip(trip_id)
    }

    pub fn start(
        &mut self,
        trip_id: impl Into<String>,
        owner: TripOwner,
        origin: Coordinate,
        label: impl Into<String>,
        timestamp_ms: u64,
    ) -> EngineResult<Trip> {
        let pending = self
            .machine
            .prepare_start(trip_id, owner, origin, label, timestamp_ms)?;
        self.persist(pending)
    }

    /// Add a checkpoint validated against `fence` at the policy's checkpoint radius
    pub fn add_checkpoint(
        &mut self,
        trip_id: &str,
        candidate: Coordinate,
        fence: &Geofence,
        label: impl Into<String>,
        timestamp_ms: u64,
    ) -> EngineResult<Trip> {
        let target = fence.with_radius(self.policy.checkpoint_radius_meters);
        let pending = self
            .machine
            .prepare_checkpoint(trip_id, candidate, &target, label, timestamp_ms)?;
        self.persist(pending)
    }

    pub fn end(&mut self, trip_id: &str) -> EngineResult<Trip> {
        let pending = self.machine.prepare_end(trip_id)?;
        self.persist(pending)
    }

    /// Reload a trip from the repository, e.g. after the host app restarted
    pub fn resume(&mut self, trip_id: &str) -> EngineResult<Trip> {
        let trip = self.repository.load(trip_id)?;
        self.machine.resume(trip.clone())?;
        Ok(trip)
    }

    fn persist(&mut self, pending: PendingTransition) -> EngineResult<Trip> {
        match self.repository.save(pending.next()) {
            Ok(()) => self.machine.commit(pending),
            Err(e) => {
                log::warn!(
                    "Trip {}: {:?} not applied, save failed: {}",
                    pending.trip_id(),
                    pending.kind(),
                    e
                );
                self.machine.abort(pending);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, RepositoryError};
    use crate::trip::{MemoryTripRepository, TripStatus};
    use chrono::NaiveDate;

    /// Fails every save after the first `allowed`
    #[derive(Default)]
    struct FlakyRepository {
        inner: MemoryTripRepository,
        allowed: u64,
    }

    impl TripRepository for FlakyRepository {
        fn save(&mut self, trip: &Trip) -> Result<(), RepositoryError> {
            if self.inner.save_count() >= self.allowed {
                return Err(RepositoryError::Backend("connection reset".to_string()));
            }
            self.inner.save(trip)
        }

        fn load(&self, trip_id: &str) -> Result<Trip, RepositoryError> {
            self.inner.load(trip_id)
        }
    }

    fn owner() -> TripOwner {
        TripOwner::new("emp-1", NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())
    }

    fn origin() -> Coordinate {
        Coordinate {
            latitude: -6.2,
            longitude: 106.8167,
        }
    }

    #[test]
    fn test_every_transition_is_saved() {
        let mut service = TripService::new(MemoryTripRepository::new(), TripPolicy::default());
        service.start("t1", owner(), origin(), "office", 0).unwrap();

        let fence = Geofence::new("client", origin(), 5_000.0);
        let near = Coordinate {
            latitude: -6.2003,
            longitude: 106.8167,
        };
        service.add_checkpoint("t1", near, &fence, "client", 1_000).unwrap();
        service.end("t1").unwrap();

        assert_eq!(service.repository().save_count(), 3);
        let stored = service.repository().load("t1").unwrap();
        assert_eq!(stored.status, TripStatus::Ended);
        assert_eq!(&stored, service.trip("t1").unwrap());
    }

    #[test]
    fn test_policy_radius_overrides_registry_radius() {
        let mut service = TripService::new(MemoryTripRepository::new(), TripPolicy::default());
        service.start("t1", owner(), origin(), "office", 0).unwrap();

        // Registry says 5 km, policy says 60 m; ~111 m away
        let fence = Geofence::new("client", origin(), 5_000.0);
        let candidate = Coordinate {
            latitude: -6.201,
            longitude: 106.8167,
        };
        let err = service
            .add_checkpoint("t1", candidate, &fence, "client", 1_000)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::OutOfRange { radius_meters, .. } if radius_meters == 60.0
        ));
        assert_eq!(service.repository().save_count(), 1);
    }

    #[test]
    fn test_failed_save_aborts_transition() {
        let repo = FlakyRepository {
            allowed: 1,
            ..FlakyRepository::default()
        };
        let mut service = TripService::new(repo, TripPolicy::default());
        service.start("t1", owner(), origin(), "office", 0).unwrap();

        let fence = Geofence::new("client", origin(), 60.0);
        let err = service
            .add_checkpoint("t1", origin(), &fence, "client", 1_000)
            .unwrap_err();
        assert!(matches!(err, EngineError::Repository(RepositoryError::Backend(_))));
        assert!(!err.blocks_action());

        let trip = service.trip("t1").unwrap();
        assert_eq!(trip.checkpoints.len(), 1);
        assert!(!service.machine().has_pending("t1"));
    }

    #[test]
    fn test_failed_start_frees_owner() {
        let mut service = TripService::new(FlakyRepository::default(), TripPolicy::default());
        assert!(service.start("t1", owner(), origin(), "office", 0).is_err());
        assert!(service.trip("t1").is_none());
        assert!(service.machine().active_trip(&owner()).is_none());
    }

    #[test]
    fn test_resume_from_repository() {
        let mut first = TripService::new(MemoryTripRepository::new(), TripPolicy::default());
        first.start("t1", owner(), origin(), "office", 0).unwrap();
        let repo = std::mem::take(&mut first.repository);

        let mut second = TripService::new(repo, TripPolicy::default());
        let trip = second.resume("t1").unwrap();
        assert_eq!(trip.status, TripStatus::Started);

        // Resumed trip still blocks a duplicate start for the same owner
        assert!(matches!(
            second.start("t2", owner(), origin(), "office", 10),
            Err(EngineError::DuplicateTrip { .. })
        ));
        assert!(matches!(
            second.resume("missing"),
            Err(EngineError::Repository(RepositoryError::NotFound(_)))
        ));
    }
}
