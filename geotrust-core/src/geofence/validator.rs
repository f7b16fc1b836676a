use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::geo::{distance_meters, Coordinate};

/// A named circular zone authorizing a location-bound action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofence {
    pub id: String,
    pub center: Coordinate,
    pub radius_meters: f64,
}

impl Geofence {
    pub fn new(id: impl Into<String>, center: Coordinate, radius_meters: f64) -> Self {
        Geofence {
            id: id.into(),
            center,
            radius_meters,
        }
    }

    /// Same zone with the radius chosen by the caller's policy
    pub fn with_radius(&self, radius_meters: f64) -> Self {
        Geofence {
            id: self.id.clone(),
            center: self.center,
            radius_meters,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.center.validate()?;
        if !self.radius_meters.is_finite() || self.radius_meters < 0.0 {
            return Err(EngineError::input(format!(
                "geofence {} has invalid radius {}",
                self.id, self.radius_meters
            )));
        }
        Ok(())
    }
}

/// Result of a single point-in-radius test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceCheck {
    pub within_radius: bool,
    pub distance_meters: f64,
}

/// The fence closest to the tested point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestFence {
    pub geofence_id: String,
    pub distance_meters: f64,
    pub within_radius: bool,
}

/// Result of testing a point against several candidate zones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiFenceCheck {
    /// `None` only when no fences were supplied
    pub nearest_fence: Option<NearestFence>,
    pub within_any: bool,
}

/// Test whether `point` lies within `fence` (boundary inclusive)
pub fn check_point(point: Coordinate, fence: &Geofence) -> GeofenceCheck {
    let distance = distance_meters(point, fence.center);
    GeofenceCheck {
        within_radius: distance <= fence.radius_meters,
        distance_meters: distance,
    }
}

/// Strict variant of [`check_point`] that validates both inputs first
pub fn checked_point(point: Coordinate, fence: &Geofence) -> EngineResult<GeofenceCheck> {
    point.validate()?;
    fence.validate()?;
    Ok(check_point(point, fence))
}

/// Test `point` against every fence. Any single match authorizes.
///
/// The nearest fence is reported by distance to its center; ties keep the
/// first fence in input order.
pub fn check_against_multiple(point: Coordinate, fences: &[Geofence]) -> MultiFenceCheck {
    let mut nearest: Option<NearestFence> = None;
    let mut within_any = false;

    for fence in fences {
        let check = check_point(point, fence);
        within_any |= check.within_radius;

        let closer = match &nearest {
            Some(n) => check.distance_meters < n.distance_meters,
            None => true,
        };
        if closer {
            nearest = Some(NearestFence {
                geofence_id: fence.id.clone(),
                distance_meters: check.distance_meters,
                within_radius: check.within_radius,
            });
        }
    }

    MultiFenceCheck {
        nearest_fence: nearest,
        within_any,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::distance_meters;

    fn c(lat: f64, lon: f64) -> Coordinate {
        Coordinate {
            latitude: lat,
            longitude: lon,
        }
    }

    #[test]
    fn test_inside_and_outside() {
        let fence = Geofence::new("hq", c(-6.2, 106.8167), 60.0);

        let inside = check_point(c(-6.20045, 106.8167), &fence);
        assert!(inside.within_radius);
        assert!((inside.distance_meters - 50.0).abs() < 0.5);

        let outside = check_point(c(-6.21, 106.8167), &fence);
        assert!(!outside.within_radius);
        assert!(outside.distance_meters > 1_000.0);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let center = c(-6.2, 106.8167);
        let point = c(-6.2009, 106.8167);
        let exact = distance_meters(point, center);

        let fence = Geofence::new("edge", center, exact);
        let check = check_point(point, &fence);
        assert_eq!(check.distance_meters, fence.radius_meters);
        assert!(check.within_radius);

        let tighter = fence.with_radius(exact - 0.001);
        assert!(!check_point(point, &tighter).within_radius);
    }

    #[test]
    fn test_with_radius_keeps_identity() {
        let fence = Geofence::new("hq", c(0.0, 0.0), 500.0);
        let policy = fence.with_radius(60.0);
        assert_eq!(policy.id, "hq");
        assert_eq!(policy.center, fence.center);
        assert_eq!(policy.radius_meters, 60.0);
    }

    #[test]
    fn test_checked_point_rejects_bad_input() {
        let fence = Geofence::new("hq", c(0.0, 0.0), 60.0);
        assert!(checked_point(c(91.0, 0.0), &fence).is_err());
        assert!(checked_point(c(0.0, 0.0), &fence.with_radius(-1.0)).is_err());
        assert!(checked_point(c(0.0, 0.0), &fence.with_radius(f64::NAN)).is_err());
        assert!(checked_point(c(0.0, 0.0), &fence).unwrap().within_radius);
    }

    #[test]
    fn test_multiple_nearest_and_any() {
        let fences = vec![
            Geofence::new("far", c(-6.3, 106.8167), 60.0),
            Geofence::new("near", c(-6.2001, 106.8167), 60.0),
            Geofence::new("wide", c(-6.25, 106.8167), 10_000.0),
        ];
        let result = check_against_multiple(c(-6.2, 106.8167), &fences);
        assert!(result.within_any);

        let nearest = result.nearest_fence.unwrap();
        assert_eq!(nearest.geofence_id, "near");
        assert!(nearest.within_radius);
    }

    #[test]
    fn test_multiple_match_through_non_nearest_fence() {
        let fences = vec![
            Geofence::new("small", c(0.0, 0.001), 10.0),
            Geofence::new("large", c(0.0, 0.01), 5_000.0),
        ];
        let result = check_against_multiple(c(0.0, 0.0), &fences);
        assert!(result.within_any);

        let nearest = result.nearest_fence.unwrap();
        assert_eq!(nearest.geofence_id, "small");
        assert!(!nearest.within_radius);
    }

    #[test]
    fn test_multiple_empty() {
        let result = check_against_multiple(c(0.0, 0.0), &[]);
        assert!(!result.within_any);
        assert!(result.nearest_fence.is_none());
    }
}
