//! Engine Configuration
//!
//! Policy values (radii, enforcement switches, anti-spoof thresholds) are
//! owned by the deployment, not by the validators. Every section has
//! serde defaults so a partial JSON document is enough to override a
//! single value.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Default radius for attendance check-in/out
pub const DEFAULT_ATTENDANCE_RADIUS_METERS: f64 = 60.0;

/// Default radius for trip checkpoints
pub const DEFAULT_CHECKPOINT_RADIUS_METERS: f64 = 60.0;

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub analyzer: AnalyzerConfig,
    pub attendance: AttendancePolicy,
    pub trip: TripPolicy,
}

impl EngineConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| EngineError::input(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::input(format!("cannot serialize configuration: {}", e)))
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.analyzer.validate()?;
        positive("attendance.radiusMeters", self.attendance.radius_meters)?;
        positive("trip.checkpointRadiusMeters", self.trip.checkpoint_radius_meters)?;
        Ok(())
    }
}

/// Attendance enforcement policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttendancePolicy {
    pub radius_meters: f64,
    /// Block check-in when the trust assessment is suspicious
    pub enforce_trust: bool,
    /// Block check-in when outside the radius (false = advisory only)
    pub enforce_radius: bool,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        AttendancePolicy {
            radius_meters: DEFAULT_ATTENDANCE_RADIUS_METERS,
            enforce_trust: false,
            enforce_radius: true,
        }
    }
}

/// Trip checkpoint policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TripPolicy {
    pub checkpoint_radius_meters: f64,
}

impl Default for TripPolicy {
    fn default() -> Self {
        TripPolicy {
            checkpoint_radius_meters: DEFAULT_CHECKPOINT_RADIUS_METERS,
        }
    }
}

/// Score contribution of each trust check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrustWeights {
    pub impossible_speed: f64,
    pub teleport_jump: f64,
    pub accuracy_implausible: f64,
    pub mock_flag_present: f64,
    pub stale_or_frozen: f64,
}

impl Default for TrustWeights {
    fn default() -> Self {
        TrustWeights {
            impossible_speed: 0.35,
            teleport_jump: 0.30,
            accuracy_implausible: 0.15,
            mock_flag_present: 1.0,
            stale_or_frozen: 0.25,
        }
    }
}

/// Thresholds for the position stream analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzerConfig {
    /// Maximum samples kept in the sliding window
    pub window_size: usize,
    /// Samples older than this (relative to the newest) leave the window
    pub window_seconds: f64,
    /// Highest believable ground speed (m/s)
    pub max_plausible_speed_mps: f64,
    /// Accuracy-corrected jumps shorter than this never count as teleports
    pub min_teleport_meters: f64,
    /// Reported accuracy above this is not physical
    pub max_plausible_accuracy_meters: f64,
    /// Identical fixes needed before a feed counts as frozen
    pub frozen_min_samples: usize,
    /// ... and the time they must span
    pub frozen_min_seconds: f64,
    /// Reported speed at or above which the device is considered moving
    pub moving_speed_mps: f64,
    /// Silence after which the stream counts as lost
    pub signal_timeout_seconds: f64,
    pub weights: TrustWeights,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            window_size: 32,
            window_seconds: 120.0,
            max_plausible_speed_mps: 55.0,
            min_teleport_meters: 500.0,
            max_plausible_accuracy_meters: 10_000.0,
            frozen_min_samples: 5,
            frozen_min_seconds: 30.0,
            moving_speed_mps: 1.0,
            signal_timeout_seconds: 60.0,
            weights: TrustWeights::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.window_size < 2 {
            return Err(EngineError::input(format!(
                "analyzer.windowSize must be at least 2, got {}",
                self.window_size
            )));
        }
        if self.frozen_min_samples < 2 {
            return Err(EngineError::input(format!(
                "analyzer.frozenMinSamples must be at least 2, got {}",
                self.frozen_min_samples
            )));
        }
        if self.frozen_min_samples > self.window_size {
            return Err(EngineError::input(format!(
                "analyzer.frozenMinSamples ({}) cannot exceed analyzer.windowSize ({})",
                self.frozen_min_samples, self.window_size
            )));
        }
        positive("analyzer.windowSeconds", self.window_seconds)?;
        positive("analyzer.maxPlausibleSpeedMps", self.max_plausible_speed_mps)?;
        positive("analyzer.maxPlausibleAccuracyMeters", self.max_plausible_accuracy_meters)?;
        positive("analyzer.signalTimeoutSeconds", self.signal_timeout_seconds)?;
        non_negative("analyzer.minTeleportMeters", self.min_teleport_meters)?;
        non_negative("analyzer.frozenMinSeconds", self.frozen_min_seconds)?;
        non_negative("analyzer.movingSpeedMps", self.moving_speed_mps)?;
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::input(format!("{} must be positive, got {}", name, value)))
    }
}

fn non_negative(name: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::input(format!(
            "{} must not be negative, got {}",
            name, value
        )))
    }
}
