use serde::{Deserialize, Serialize};

use crate::config::{AnalyzerConfig, AttendancePolicy};
use crate::error::{EngineError, EngineResult};
use crate::geo::PositionSample;
use crate::geofence::{check_against_multiple, check_point, Geofence};
use crate::trust::{PositionStreamAnalyzer, TrustAssessment};

/// Which results block a check-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardOptions {
    pub enforce_trust: bool,
    pub enforce_radius: bool,
}

impl Default for GuardOptions {
    fn default() -> Self {
        GuardOptions {
            enforce_trust: false,
            enforce_radius: true,
        }
    }
}

impl From<&AttendancePolicy> for GuardOptions {
    fn from(policy: &AttendancePolicy) -> Self {
        GuardOptions {
            enforce_trust: policy.enforce_trust,
            enforce_radius: policy.enforce_radius,
        }
    }
}

impl GuardOptions {
    /// `within && (!enforce_trust || !suspicious)`, with the radius term
    /// dropped when radius enforcement is off
    pub fn allows(&self, within_radius: bool, trust: &TrustAssessment) -> bool {
        (within_radius || !self.enforce_radius) && (!self.enforce_trust || !trust.is_suspicious)
    }
}

/// Geometric half of an attendance decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceGeoCheck {
    pub within_radius: bool,
    pub distance_meters: f64,
    pub geofence_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceDecision {
    pub allowed: bool,
    pub geo: AttendanceGeoCheck,
    pub trust: TrustAssessment,
}

impl AttendanceDecision {
    pub fn distance_meters(&self) -> f64 {
        self.geo.distance_meters
    }

    pub fn within_radius(&self) -> bool {
        self.geo.within_radius
    }
}

/// Facade for one attendance session: owns the session's analyzer and
/// applies the deployment's radius and enforcement policy.
#[derive(Debug, Clone)]
pub struct AttendanceRadiusGuard {
    analyzer: PositionStreamAnalyzer,
    options: GuardOptions,
    /// Policy radius applied to every fence; `None` uses the fence's own radius
    radius_meters: Option<f64>,
}

impl AttendanceRadiusGuard {
    pub fn new(analyzer: PositionStreamAnalyzer, options: GuardOptions) -> Self {
        AttendanceRadiusGuard {
            analyzer,
            options,
            radius_meters: None,
        }
    }

    /// Guard enforcing `policy`, radius included
    pub fn from_policy(policy: &AttendancePolicy, analyzer: AnalyzerConfig) -> EngineResult<Self> {
        if !policy.radius_meters.is_finite() || policy.radius_meters <= 0.0 {
            return Err(EngineError::input(format!(
                "attendance radius must be positive, got {}",
                policy.radius_meters
            )));
        }
        Ok(AttendanceRadiusGuard {
            analyzer: PositionStreamAnalyzer::new(analyzer)?,
            options: GuardOptions::from(policy),
            radius_meters: Some(policy.radius_meters),
        })
    }

    pub fn options(&self) -> GuardOptions {
        self.options
    }

    pub fn set_options(&mut self, options: GuardOptions) {
        self.options = options;
    }

    pub fn analyzer(&self) -> &PositionStreamAnalyzer {
        &self.analyzer
    }

    pub fn analyzer_mut(&mut self) -> &mut PositionStreamAnalyzer {
        &mut self.analyzer
    }

    /// Start a new watch session with no trust history
    pub fn reset_session(&mut self) {
        self.analyzer.reset();
    }

    /// Decide a check-in/out for `sample` against `fence` with the guard's options
    pub fn evaluate(
        &mut self,
        sample: PositionSample,
        fence: &Geofence,
    ) -> EngineResult<AttendanceDecision> {
        let options = self.options;
        self.evaluate_with(sample, fence, options)
    }

    /// Same as [`evaluate`](Self::evaluate) with per-call options
    pub fn evaluate_with(
        &mut self,
        sample: PositionSample,
        fence: &Geofence,
        options: GuardOptions,
    ) -> EngineResult<AttendanceDecision> {
        let target = self.policy_fence(fence);
        target.validate()?;

        let point = sample.coordinate;
        let trust = self.analyzer.ingest_sample(sample)?;
        let check = check_point(point, &target);

        let geo = AttendanceGeoCheck {
            within_radius: check.within_radius,
            distance_meters: check.distance_meters,
            geofence_id: target.id.clone(),
        };
        Ok(decide(geo, trust, options))
    }

    /// Decide against several candidate zones; any match authorizes.
    ///
    /// Reports the closest matching fence, or the nearest fence when none match.
    pub fn evaluate_multiple(
        &mut self,
        sample: PositionSample,
        fences: &[Geofence],
    ) -> EngineResult<AttendanceDecision> {
        if fences.is_empty() {
            return Err(EngineError::input("no geofences to check against"));
        }
        let targets: Vec<Geofence> = fences.iter().map(|f| self.policy_fence(f)).collect();
        for t in &targets {
            t.validate()?;
        }

        let point = sample.coordinate;
        let trust = self.analyzer.ingest_sample(sample)?;

        let multi = check_against_multiple(point, &targets);
        let closest_match = targets
            .iter()
            .map(|t| (t, check_point(point, t)))
            .filter(|(_, c)| c.within_radius)
            .min_by(|a, b| a.1.distance_meters.total_cmp(&b.1.distance_meters));

        let geo = match (closest_match, multi.nearest_fence) {
            (Some((fence, check)), _) => AttendanceGeoCheck {
                within_radius: true,
                distance_meters: check.distance_meters,
                geofence_id: fence.id.clone(),
            },
            (None, Some(nearest)) => AttendanceGeoCheck {
                within_radius: multi.within_any,
                distance_meters: nearest.distance_meters,
                geofence_id: nearest.geofence_id,
            },
            (None, None) => return Err(EngineError::input("no geofences to check against")),
        };

        let options = self.options;
        Ok(decide(geo, trust, options))
    }

    fn policy_fence(&self, fence: &Geofence) -> Geofence {
        match self.radius_meters {
            Some(r) => fence.with_radius(r),
            None => fence.clone(),
        }
    }
}

fn decide(
    geo: AttendanceGeoCheck,
    trust: TrustAssessment,
    options: GuardOptions,
) -> AttendanceDecision {
    let allowed = options.allows(geo.within_radius, &trust);

    if !geo.within_radius && !options.enforce_radius {
        log::warn!(
            "Attendance outside {} ({:.1} m) allowed: radius enforcement is off",
            geo.geofence_id,
            geo.distance_meters
        );
    }
    if trust.is_suspicious {
        if options.enforce_trust {
            log::warn!("Attendance blocked, suspicious position: {:?}", trust.labels());
        } else {
            log::warn!(
                "Suspicious position not enforced (advisory mode): {:?}",
                trust.labels()
            );
        }
    }

    AttendanceDecision {
        allowed,
        geo,
        trust,
    }
}
