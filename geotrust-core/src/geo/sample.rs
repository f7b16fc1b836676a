use serde::{Deserialize, Serialize};

use super::Coordinate;

/// One reading from a device location stream.
///
/// Samples are produced per device callback and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    pub coordinate: Coordinate,

    /// Reported horizontal accuracy (radius, meters)
    pub accuracy_meters: f64,

    /// Milliseconds since epoch
    pub timestamp_ms: u64,

    /// Ground speed in m/s, if the platform reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    /// Heading in degrees from true north, if the platform reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,

    /// Platform mock-location flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_mocked: Option<bool>,
}

impl PositionSample {
    pub fn new(coordinate: Coordinate, accuracy_meters: f64, timestamp_ms: u64) -> Self {
        PositionSample {
            coordinate,
            accuracy_meters,
            timestamp_ms,
            speed: None,
            heading: None,
            is_mocked: None,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    pub fn with_mocked(mut self, mocked: bool) -> Self {
        self.is_mocked = Some(mocked);
        self
    }

    pub fn is_mocked(&self) -> bool {
        self.is_mocked == Some(true)
    }

    /// Accuracy usable for distance slack: negative or non-finite values count as zero
    pub fn accuracy_slack(&self) -> f64 {
        if self.accuracy_meters.is_finite() && self.accuracy_meters > 0.0 {
            self.accuracy_meters
        } else {
            0.0
        }
    }
}
