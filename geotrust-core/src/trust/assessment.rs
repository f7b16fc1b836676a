use serde::{Deserialize, Serialize};

use crate::config::TrustWeights;

/// Named trust check, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrustReason {
    ImpossibleSpeed,
    TeleportJump,
    AccuracyImplausible,
    MockFlagPresent,
    StaleOrFrozen,
}

impl TrustReason {
    pub fn label(self) -> &'static str {
        match self {
            TrustReason::ImpossibleSpeed => "ImpossibleSpeed",
            TrustReason::TeleportJump => "TeleportJump",
            TrustReason::AccuracyImplausible => "AccuracyImplausible",
            TrustReason::MockFlagPresent => "MockFlagPresent",
            TrustReason::StaleOrFrozen => "StaleOrFrozen",
        }
    }

    /// Score contribution of this reason
    pub fn weight(self, weights: &TrustWeights) -> f64 {
        match self {
            TrustReason::ImpossibleSpeed => weights.impossible_speed,
            TrustReason::TeleportJump => weights.teleport_jump,
            TrustReason::AccuracyImplausible => weights.accuracy_implausible,
            TrustReason::MockFlagPresent => weights.mock_flag_present,
            TrustReason::StaleOrFrozen => weights.stale_or_frozen,
        }
    }
}

impl std::fmt::Display for TrustReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Verdict for one incoming sample. Recomputed per sample, never persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustAssessment {
    pub is_suspicious: bool,
    pub reasons: Vec<TrustReason>,
    /// Weighted sum of the triggered reasons
    pub score: f64,
    /// Speed implied by the previous sample, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implied_speed_mps: Option<f64>,
}

impl TrustAssessment {
    /// Build an assessment from triggered reasons (kept in the given order)
    pub fn from_reasons(reasons: Vec<TrustReason>, weights: &TrustWeights) -> Self {
        let score = reasons.iter().map(|r| r.weight(weights)).sum();
        TrustAssessment {
            is_suspicious: !reasons.is_empty(),
            reasons,
            score,
            implied_speed_mps: None,
        }
    }

    pub fn has(&self, reason: TrustReason) -> bool {
        self.reasons.contains(&reason)
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.reasons.iter().map(|r| r.label()).collect()
    }
}
