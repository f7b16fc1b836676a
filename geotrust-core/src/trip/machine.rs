use std::collections::{HashMap, HashSet};

use crate::error::{EngineError, EngineResult};
use crate::geo::{distance_meters, Coordinate};
use crate::geofence::{check_point, Geofence};

use super::model::{Checkpoint, Trip, TripOwner, TripStatus};

/// What a pending transition will do when committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Start,
    Checkpoint,
    End,
}

/// A fully computed, not yet applied trip transition.
///
/// Holds the lock on its trip until passed to
/// [`TripStateMachine::commit`] or [`TripStateMachine::abort`].
#[derive(Debug)]
#[must_use = "a pending transition locks its trip until committed or aborted"]
pub struct PendingTransition {
    kind: TransitionKind,
    next: Trip,
}

impl PendingTransition {
    pub fn kind(&self) -> TransitionKind {
        self.kind
    }

    pub fn trip_id(&self) -> &str {
        &self.next.id
    }

    /// The trip as it will be after commit
    pub fn next(&self) -> &Trip {
        &self.next
    }
}

/// Lifecycle rules for all trips of one engine instance
#[derive(Debug, Default)]
pub struct TripStateMachine {
    trips: HashMap<String, Trip>,
    /// Owner -> id of their started (or pending start) trip
    active: HashMap<TripOwner, String>,
    /// Trip ids with a transition in flight
    pending: HashSet<String>,
}

impl TripStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip(&self, trip_id: &str) -> Option<&Trip> {
        self.trips.get(trip_id)
    }

    /// The owner's started trip, if any
    pub fn active_trip(&self, owner: &TripOwner) -> Option<&Trip> {
        self.active.get(owner).and_then(|id| self.trips.get(id))
    }

    pub fn has_pending(&self, trip_id: &str) -> bool {
        self.pending.contains(trip_id)
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    // -------------------------------------------------------------------------
    // One-shot operations
    // -------------------------------------------------------------------------

    /// Start a trip with `origin` as checkpoint 0
    pub fn start(
        &mut self,
        trip_id: impl Into<String>,
        owner: TripOwner,
        origin: Coordinate,
        label: impl Into<String>,
        timestamp_ms: u64,
    ) -> EngineResult<Trip> {
        let pending = self.prepare_start(trip_id, owner, origin, label, timestamp_ms)?;
        self.commit(pending)
    }

    /// Record a checkpoint if `candidate` lies inside `fence`.
    ///
    /// On any error the trip is left exactly as it was.
    pub fn add_checkpoint(
        &mut self,
        trip_id: &str,
        candidate: Coordinate,
        fence: &Geofence,
        label: impl Into<String>,
        timestamp_ms: u64,
    ) -> EngineResult<Trip> {
        let pending = self.prepare_checkpoint(trip_id, candidate, fence, label, timestamp_ms)?;
        self.commit(pending)
    }

    /// Seal a started trip
    pub fn end(&mut self, trip_id: &str) -> EngineResult<Trip> {
        let pending = self.prepare_end(trip_id)?;
        self.commit(pending)
    }

    // -------------------------------------------------------------------------
    // Two-phase operations
    // -------------------------------------------------------------------------

    pub fn prepare_start(
        &mut self,
        trip_id: impl Into<String>,
        owner: TripOwner,
        origin: Coordinate,
        label: impl Into<String>,
        timestamp_ms: u64,
    ) -> EngineResult<PendingTransition> {
        let trip_id = trip_id.into();
        origin.validate()?;

        if self.pending.contains(&trip_id) {
            return Err(EngineError::ConcurrentModification { trip_id });
        }
        if self.trips.contains_key(&trip_id) {
            return Err(EngineError::input(format!("trip {} already exists", trip_id)));
        }
        if let Some(existing) = self.active.get(&owner) {
            return Err(EngineError::DuplicateTrip {
                actor_id: owner.actor_id.clone(),
                day: owner.day,
                existing_trip_id: existing.clone(),
            });
        }

        let mut next = Trip::new(trip_id.clone(), owner.clone());
        next.status = TripStatus::Started;
        next.checkpoints.push(Checkpoint {
            sequence: 0,
            coordinate: origin,
            timestamp_ms,
            distance_from_previous_meters: 0.0,
            label: label.into(),
        });

        // Reserve the owner slot so a parallel start fails as a duplicate
        self.active.insert(owner, trip_id.clone());
        self.pending.insert(trip_id);

        Ok(PendingTransition {
            kind: TransitionKind::Start,
            next,
        })
    }

    pub fn prepare_checkpoint(
        &mut self,
        trip_id: &str,
        candidate: Coordinate,
        fence: &Geofence,
        label: impl Into<String>,
        timestamp_ms: u64,
    ) -> EngineResult<PendingTransition> {
        let trip = self.lockable(trip_id)?;
        if !trip.is_started() {
            return Err(EngineError::InvalidState {
                trip_id: trip_id.to_string(),
                status: trip.status,
                operation: "add checkpoint to",
            });
        }
        candidate.validate()?;
        fence.validate()?;

        let check = check_point(candidate, fence);
        if !check.within_radius {
            log::warn!(
                "Trip {}: checkpoint rejected, {:.1} m from {} (radius {:.1} m)",
                trip_id,
                check.distance_meters,
                fence.id,
                fence.radius_meters
            );
            return Err(EngineError::OutOfRange {
                distance_meters: check.distance_meters,
                radius_meters: fence.radius_meters,
                geofence_id: fence.id.clone(),
            });
        }

        let last = trip.last_checkpoint().ok_or_else(|| {
            EngineError::input(format!("started trip {} has no origin", trip_id))
        })?;
        if timestamp_ms < last.timestamp_ms {
            return Err(EngineError::input(format!(
                "checkpoint at {} ms precedes checkpoint {} at {} ms",
                timestamp_ms, last.sequence, last.timestamp_ms
            )));
        }

        let delta = distance_meters(last.coordinate, candidate);
        let mut next = trip.clone();
        next.checkpoints.push(Checkpoint {
            sequence: next.checkpoints.len() as u32,
            coordinate: candidate,
            timestamp_ms,
            distance_from_previous_meters: delta,
            label: label.into(),
        });
        next.total_distance_meters += delta;

        self.pending.insert(trip_id.to_string());
        Ok(PendingTransition {
            kind: TransitionKind::Checkpoint,
            next,
        })
    }

    pub fn prepare_end(&mut self, trip_id: &str) -> EngineResult<PendingTransition> {
        let trip = self.lockable(trip_id)?;
        if !trip.is_started() {
            return Err(EngineError::InvalidState {
                trip_id: trip_id.to_string(),
                status: trip.status,
                operation: "end",
            });
        }

        let mut next = trip.clone();
        next.status = TripStatus::Ended;

        self.pending.insert(trip_id.to_string());
        Ok(PendingTransition {
            kind: TransitionKind::End,
            next,
        })
    }

    /// Apply a prepared transition and release the trip
    pub fn commit(&mut self, pending: PendingTransition) -> EngineResult<Trip> {
        let trip_id = pending.next.id.clone();
        if !self.pending.remove(&trip_id) {
            return Err(EngineError::input(format!(
                "no transition pending for trip {}",
                trip_id
            )));
        }

        let next = pending.next;
        match pending.kind {
            TransitionKind::Start => {
                log::info!(
                    "Trip {} started for {} on {}",
                    trip_id,
                    next.owner.actor_id,
                    next.owner.day
                );
            }
            TransitionKind::Checkpoint => {
                log::info!(
                    "Trip {}: checkpoint {} accepted, total {:.1} m",
                    trip_id,
                    next.checkpoints.len() - 1,
                    next.total_distance_meters
                );
            }
            TransitionKind::End => {
                self.active.remove(&next.owner);
                log::info!(
                    "Trip {} ended after {} checkpoints, {:.1} m",
                    trip_id,
                    next.checkpoints.len(),
                    next.total_distance_meters
                );
            }
        }

        self.trips.insert(trip_id, next.clone());
        Ok(next)
    }

    /// Drop a prepared transition, leaving the trip as it was
    pub fn abort(&mut self, pending: PendingTransition) {
        let trip_id = pending.trip_id();
        if !self.pending.remove(trip_id) {
            return;
        }
        if pending.kind == TransitionKind::Start
            && self.active.get(&pending.next.owner).map(String::as_str) == Some(trip_id)
        {
            self.active.remove(&pending.next.owner);
        }
        log::debug!("Trip {}: {:?} transition aborted", trip_id, pending.kind);
    }

    // -------------------------------------------------------------------------
    // Resumption
    // -------------------------------------------------------------------------

    /// Rebuild state for a trip reloaded from storage
    pub fn resume(&mut self, trip: Trip) -> EngineResult<()> {
        trip.verify_integrity()?;
        if trip.status == TripStatus::Created {
            return Err(EngineError::InvalidState {
                trip_id: trip.id.clone(),
                status: trip.status,
                operation: "resume",
            });
        }
        if self.pending.contains(&trip.id) {
            return Err(EngineError::ConcurrentModification {
                trip_id: trip.id.clone(),
            });
        }
        if let Some(current) = self.trips.get(&trip.id) {
            // A record may only catch the machine up, never roll it back
            let stale = if current.is_ended() {
                *current != trip
            } else {
                trip.checkpoints.len() < current.checkpoints.len()
            };
            if stale {
                log::warn!(
                    "Trip {}: refusing to resume {} record with {} checkpoints over {} trip with {}",
                    trip.id,
                    trip.status,
                    trip.checkpoints.len(),
                    current.status,
                    current.checkpoints.len()
                );
                return Err(EngineError::InvalidState {
                    trip_id: trip.id.clone(),
                    status: current.status,
                    operation: "resume an older record of",
                });
            }
        }

        if trip.is_started() {
            if let Some(existing) = self.active.get(&trip.owner) {
                if *existing != trip.id {
                    return Err(EngineError::DuplicateTrip {
                        actor_id: trip.owner.actor_id.clone(),
                        day: trip.owner.day,
                        existing_trip_id: existing.clone(),
                    });
                }
            }
            self.active.insert(trip.owner.clone(), trip.id.clone());
        } else if self.active.get(&trip.owner) == Some(&trip.id) {
            self.active.remove(&trip.owner);
        }

        log::info!(
            "Trip {} resumed as {} with {} checkpoints",
            trip.id,
            trip.status,
            trip.checkpoints.len()
        );
        self.trips.insert(trip.id.clone(), trip);
        Ok(())
    }

    /// Forget an ended trip
    pub fn release(&mut self, trip_id: &str) -> EngineResult<Option<Trip>> {
        let status = match self.trips.get(trip_id) {
            Some(trip) => trip.status,
            None => return Ok(None),
        };
        if status != TripStatus::Ended || self.pending.contains(trip_id) {
            return Err(EngineError::InvalidState {
                trip_id: trip_id.to_string(),
                status,
                operation: "release",
            });
        }
        Ok(self.trips.remove(trip_id))
    }

    /// Look up a trip that may be locked for a new mutation
    fn lockable(&self, trip_id: &str) -> EngineResult<&Trip> {
        if self.pending.contains(trip_id) {
            return Err(EngineError::ConcurrentModification {
                trip_id: trip_id.to_string(),
            });
        }
        self.trips
            .get(trip_id)
            .ok_or_else(|| EngineError::input(format!("unknown trip {}", trip_id)))
    }
}
