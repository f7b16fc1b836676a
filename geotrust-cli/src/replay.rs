use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use geotrust_core::config::{AnalyzerConfig, AttendancePolicy};
use geotrust_core::{AttendanceDecision, AttendanceRadiusGuard, EngineError, Geofence, PositionSample};
use serde::Serialize;

/// One output line of a replay
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ReplayEvent {
    Decision {
        index: usize,
        timestamp_ms: u64,
        #[serde(flatten)]
        decision: AttendanceDecision,
    },
    /// Gap longer than the signal timeout; the session restarts
    SignalLost {
        index: usize,
        silent_for_ms: Option<u64>,
    },
    Rejected {
        index: usize,
        error: String,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub allowed: usize,
    pub denied: usize,
    pub rejected: usize,
    pub signal_losses: usize,
}

pub fn read_samples(path: &Path) -> anyhow::Result<Vec<PositionSample>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read samples {}", path.display()))?;
    let samples: Vec<PositionSample> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of position samples", path.display()))?;
    log::info!("Read {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

/// Run `samples` through a fresh attendance session, writing one JSON event per line
pub fn replay<W: Write>(
    samples: &[PositionSample],
    fence: &Geofence,
    policy: &AttendancePolicy,
    analyzer: &AnalyzerConfig,
    out: &mut W,
) -> anyhow::Result<ReplaySummary> {
    // The fence given on the command line carries the radius to use
    let mut policy = policy.clone();
    policy.radius_meters = fence.radius_meters;
    let mut guard = AttendanceRadiusGuard::from_policy(&policy, analyzer.clone())?;
    let mut summary = ReplaySummary::default();

    for (index, sample) in samples.iter().enumerate() {
        if let Err(EngineError::SignalLost { silent_for_ms }) =
            guard.analyzer().check_signal(sample.timestamp_ms)
        {
            log::warn!(
                "Sample {}: no fix for {:?} ms (timeout {} s), starting a new session",
                index,
                silent_for_ms,
                guard.analyzer().config().signal_timeout_seconds
            );
            summary.signal_losses += 1;
            write_event(out, &ReplayEvent::SignalLost { index, silent_for_ms })?;
            guard.reset_session();
        }

        let event = match guard.evaluate(sample.clone(), fence) {
            Ok(decision) => {
                if decision.allowed {
                    summary.allowed += 1;
                } else {
                    summary.denied += 1;
                }
                ReplayEvent::Decision {
                    index,
                    timestamp_ms: sample.timestamp_ms,
                    decision,
                }
            }
            Err(e) => {
                log::warn!("Sample {} rejected: {}", index, e);
                summary.rejected += 1;
                ReplayEvent::Rejected {
                    index,
                    error: e.to_string(),
                }
            }
        };
        write_event(out, &event)?;
    }

    log::info!(
        "Replayed {} samples: {} allowed, {} denied, {} rejected, {} signal losses",
        samples.len(),
        summary.allowed,
        summary.denied,
        summary.rejected,
        summary.signal_losses
    );
    Ok(summary)
}

fn write_event<W: Write>(out: &mut W, event: &ReplayEvent) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, event)?;
    writeln!(out)?;
    Ok(())
}
