use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use geotrust_core::config::TripPolicy;
use geotrust_core::trip::MemoryTripRepository;
use geotrust_core::{Coordinate, Geofence, Trip, TripOwner, TripService};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A recorded trip: where it started and what was attempted afterwards
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripScript {
    pub trip_id: String,
    pub actor_id: String,
    pub day: NaiveDate,
    pub origin: Coordinate,
    #[serde(default = "default_origin_label")]
    pub origin_label: String,
    pub started_at_ms: u64,
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
}

fn default_origin_label() -> String {
    "origin".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ScriptStep {
    Checkpoint {
        coordinate: Coordinate,
        fence: Geofence,
        label: String,
        timestamp_ms: u64,
    },
    End,
}

#[derive(Error, Debug, PartialEq)]
pub enum ScriptError {
    #[error("step {index} comes after the trip was ended")]
    StepAfterEnd { index: usize },
    #[error("step {index} is dated {timestamp_ms}, before the trip started at {started_at_ms}")]
    BeforeStart {
        index: usize,
        timestamp_ms: u64,
        started_at_ms: u64,
    },
}

impl TripScript {
    /// Structural checks that do not need the engine
    pub fn validate(&self) -> Result<(), ScriptError> {
        let mut ended = false;
        for (index, step) in self.steps.iter().enumerate() {
            if ended {
                return Err(ScriptError::StepAfterEnd { index });
            }
            match step {
                ScriptStep::Checkpoint { timestamp_ms, .. } if *timestamp_ms < self.started_at_ms => {
                    return Err(ScriptError::BeforeStart {
                        index,
                        timestamp_ms: *timestamp_ms,
                        started_at_ms: self.started_at_ms,
                    });
                }
                ScriptStep::Checkpoint { .. } => {}
                ScriptStep::End => ended = true,
            }
        }
        Ok(())
    }
}

/// One output line of a trip run
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TripEvent<'a> {
    Started {
        trip_id: &'a str,
    },
    CheckpointAccepted {
        index: usize,
        sequence: u32,
        distance_from_previous_meters: f64,
        total_distance_meters: f64,
    },
    CheckpointRejected {
        index: usize,
        distance_meters: Option<f64>,
        error: String,
    },
    Ended {
        index: usize,
    },
    Final {
        trip: &'a Trip,
    },
}

pub fn read_script(path: &Path) -> anyhow::Result<TripScript> {
    let text =
        fs::read_to_string(path).with_context(|| format!("cannot read script {}", path.display()))?;
    let script: TripScript = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid trip script", path.display()))?;
    script.validate()?;
    Ok(script)
}

/// Play `script` through a trip service backed by the in-memory repository.
///
/// Rejected checkpoints are reported and skipped; any other engine error
/// stops the run.
pub fn run_script<W: Write>(
    script: &TripScript,
    policy: &TripPolicy,
    out: &mut W,
) -> anyhow::Result<Trip> {
    let mut service = TripService::new(MemoryTripRepository::new(), policy.clone());
    let owner = TripOwner::new(script.actor_id.clone(), script.day);

    service
        .start(
            script.trip_id.clone(),
            owner,
            script.origin,
            script.origin_label.clone(),
            script.started_at_ms,
        )
        .with_context(|| format!("cannot start trip {}", script.trip_id))?;
    write_event(
        out,
        &TripEvent::Started {
            trip_id: &script.trip_id,
        },
    )?;

    for (index, step) in script.steps.iter().enumerate() {
        match step {
            ScriptStep::Checkpoint {
                coordinate,
                fence,
                label,
                timestamp_ms,
            } => {
                match service.add_checkpoint(
                    &script.trip_id,
                    *coordinate,
                    fence,
                    label.clone(),
                    *timestamp_ms,
                ) {
                    Ok(trip) => {
                        let Some(checkpoint) = trip.last_checkpoint() else {
                            anyhow::bail!("trip {} has no checkpoints after step {}", trip.id, index);
                        };
                        write_event(
                            out,
                            &TripEvent::CheckpointAccepted {
                                index,
                                sequence: checkpoint.sequence,
                                distance_from_previous_meters: checkpoint
                                    .distance_from_previous_meters,
                                total_distance_meters: trip.total_distance_meters,
                            },
                        )?;
                    }
                    Err(e) if e.is_out_of_range() => {
                        write_event(
                            out,
                            &TripEvent::CheckpointRejected {
                                index,
                                distance_meters: e.distance_meters(),
                                error: e.to_string(),
                            },
                        )?;
                    }
                    Err(e) => {
                        return Err(e).with_context(|| format!("step {} failed", index));
                    }
                }
            }
            ScriptStep::End => {
                service
                    .end(&script.trip_id)
                    .with_context(|| format!("step {} failed", index))?;
                write_event(out, &TripEvent::Ended { index })?;
            }
        }
    }

    let Some(trip) = service.trip(&script.trip_id) else {
        anyhow::bail!("trip {} disappeared", script.trip_id);
    };
    let trip = trip.clone();
    write_event(out, &TripEvent::Final { trip: &trip })?;
    log::info!(
        "Trip {}: {} checkpoints, {:.1} m, {}",
        trip.id,
        trip.checkpoints.len(),
        trip.total_distance_meters,
        trip.status
    );
    Ok(trip)
}

fn write_event<W: Write>(out: &mut W, event: &TripEvent) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, event)?;
    writeln!(out)?;
    Ok(())
}
