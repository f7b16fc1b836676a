use std::collections::VecDeque;

use crate::config::AnalyzerConfig;
use crate::error::{EngineError, EngineResult};
use crate::geo::{distance_meters, PositionSample};

use super::assessment::{TrustAssessment, TrustReason};

/// Stateful anti-spoof analyzer for one location watch session.
///
/// Push-driven: the owner forwards each device sample to
/// [`ingest_sample`](Self::ingest_sample). There are no timers; silence is
/// detected when the owner asks for [`current_assessment`](Self::current_assessment).
///
/// State survives a stopped watch. Call [`reset`](Self::reset) before
/// starting a new session.
#[derive(Debug, Clone)]
pub struct PositionStreamAnalyzer {
    config: AnalyzerConfig,
    /// Oldest first
    window: VecDeque<PositionSample>,
    last_assessment: Option<TrustAssessment>,
    samples_seen: u64,
    signal_lost: bool,
}

impl PositionStreamAnalyzer {
    pub fn new(config: AnalyzerConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(PositionStreamAnalyzer {
            window: VecDeque::with_capacity(config.window_size),
            config,
            last_assessment: None,
            samples_seen: 0,
            signal_lost: false,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Assess a new sample and add it to the window.
    ///
    /// Fails with `Input` for a malformed coordinate and with `SignalLost`
    /// after the stream was reported lost and before [`reset`](Self::reset).
    pub fn ingest_sample(&mut self, sample: PositionSample) -> EngineResult<TrustAssessment> {
        if self.signal_lost {
            return Err(EngineError::SignalLost {
                silent_for_ms: None,
            });
        }
        sample.coordinate.validate()?;

        let mut reasons = Vec::new();
        let mut implied_speed = None;

        if let Some(prev) = self.window.back() {
            let distance = distance_meters(prev.coordinate, sample.coordinate);
            let elapsed = elapsed_seconds(prev, &sample);
            let slack = prev.accuracy_slack() + sample.accuracy_slack();

            // Movement inside the combined accuracy never counts. The reported
            // implied speed stays uncorrected.
            let corrected = distance - slack;
            if elapsed > 0.0 {
                implied_speed = Some(distance / elapsed);
                if corrected > 0.0 && corrected / elapsed > self.config.max_plausible_speed_mps {
                    reasons.push(TrustReason::ImpossibleSpeed);
                }
            } else if corrected > 0.0 {
                // Same instant (or clock went backwards), different place
                reasons.push(TrustReason::ImpossibleSpeed);
            }

            if corrected >= self.config.min_teleport_meters
                && corrected > self.config.max_plausible_speed_mps * elapsed
            {
                reasons.push(TrustReason::TeleportJump);
            }
        }

        if !self.accuracy_plausible(sample.accuracy_meters) {
            reasons.push(TrustReason::AccuracyImplausible);
        }

        if sample.is_mocked() {
            reasons.push(TrustReason::MockFlagPresent);
        }

        self.push(sample);

        if self.frozen_while_moving() {
            reasons.push(TrustReason::StaleOrFrozen);
        }

        let mut assessment = TrustAssessment::from_reasons(reasons, &self.config.weights);
        assessment.implied_speed_mps = implied_speed;

        if assessment.is_suspicious {
            log::debug!(
                "Suspicious position sample #{}: {:?} (score {:.2})",
                self.samples_seen,
                assessment.labels(),
                assessment.score
            );
        }

        self.samples_seen += 1;
        self.last_assessment = Some(assessment.clone());
        Ok(assessment)
    }

    /// The owner's location watch reported an error or stopped unexpectedly
    pub fn report_signal_lost(&mut self) {
        if !self.signal_lost {
            log::warn!(
                "Location signal lost after {} samples, trust state frozen until reset",
                self.samples_seen
            );
        }
        self.signal_lost = true;
    }

    /// Check the stream is still alive at `now_ms`
    pub fn check_signal(&self, now_ms: u64) -> EngineResult<()> {
        if self.signal_lost {
            return Err(EngineError::SignalLost {
                silent_for_ms: None,
            });
        }
        if let Some(last) = self.window.back() {
            let silent = now_ms.saturating_sub(last.timestamp_ms);
            if silent as f64 > self.config.signal_timeout_seconds * 1000.0 {
                return Err(EngineError::SignalLost {
                    silent_for_ms: Some(silent),
                });
            }
        }
        Ok(())
    }

    /// Latest assessment, provided the stream has not gone silent.
    ///
    /// `Ok(None)` means no sample has arrived yet in this session.
    pub fn current_assessment(&self, now_ms: u64) -> EngineResult<Option<&TrustAssessment>> {
        self.check_signal(now_ms)?;
        Ok(self.last_assessment.as_ref())
    }

    /// Latest assessment without the liveness check
    pub fn last_assessment(&self) -> Option<&TrustAssessment> {
        self.last_assessment.as_ref()
    }

    /// Forget all history. Required before a new watch session.
    pub fn reset(&mut self) {
        self.window.clear();
        self.last_assessment = None;
        self.samples_seen = 0;
        self.signal_lost = false;
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    pub fn is_signal_lost(&self) -> bool {
        self.signal_lost
    }

    fn accuracy_plausible(&self, accuracy: f64) -> bool {
        accuracy.is_finite()
            && accuracy > 0.0
            && accuracy <= self.config.max_plausible_accuracy_meters
    }

    fn push(&mut self, sample: PositionSample) {
        let newest = sample.timestamp_ms;
        self.window.push_back(sample);

        while self.window.len() > self.config.window_size {
            self.window.pop_front();
        }

        let max_age_ms = self.config.window_seconds * 1000.0;
        while let Some(front) = self.window.front() {
            if newest.saturating_sub(front.timestamp_ms) as f64 > max_age_ms {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Newest run of bit-identical fixes is long enough, spans enough time,
    /// and speed or heading claims the device is moving.
    fn frozen_while_moving(&self) -> bool {
        let newest = match self.window.back() {
            Some(s) => s,
            None => return false,
        };

        let run: Vec<&PositionSample> = self
            .window
            .iter()
            .rev()
            .take_while(|s| s.coordinate.bit_identical(&newest.coordinate))
            .collect();

        if run.len() < self.config.frozen_min_samples {
            return false;
        }

        // `run` is newest first
        let oldest = run[run.len() - 1];
        let span = newest.timestamp_ms.saturating_sub(oldest.timestamp_ms) as f64 / 1000.0;
        if span <= self.config.frozen_min_seconds {
            return false;
        }

        let reports_speed = run.iter().any(|s| {
            s.speed
                .map(|v| v.is_finite() && v > 0.0 && v >= self.config.moving_speed_mps)
                .unwrap_or(false)
        });

        let mut headings = run
            .iter()
            .filter_map(|s| s.heading)
            .filter(|h| h.is_finite());
        let heading_changes = match headings.next() {
            Some(first) => headings.any(|h| h.to_bits() != first.to_bits()),
            None => false,
        };

        reports_speed || heading_changes
    }
}

fn elapsed_seconds(prev: &PositionSample, curr: &PositionSample) -> f64 {
    curr.timestamp_ms.saturating_sub(prev.timestamp_ms) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;

    fn c(lat: f64, lon: f64) -> Coordinate {
        Coordinate {
            latitude: lat,
            longitude: lon,
        }
    }

    fn sample(lat: f64, lon: f64, t_ms: u64) -> PositionSample {
        PositionSample::new(c(lat, lon), 10.0, t_ms)
    }

    fn analyzer() -> PositionStreamAnalyzer {
        PositionStreamAnalyzer::new(AnalyzerConfig::default()).unwrap()
    }

    #[test]
    fn test_first_sample_clean() {
        let mut a = analyzer();
        let trust = a.ingest_sample(sample(-6.2, 106.8167, 0)).unwrap();
        assert!(!trust.is_suspicious);
        assert!(trust.reasons.is_empty());
        assert_eq!(trust.implied_speed_mps, None);
        assert_eq!(a.window_len(), 1);
    }

    #[test]
    fn test_walking_pace_clean() {
        let mut a = analyzer();
        a.ingest_sample(sample(-6.2, 106.8167, 0)).unwrap();
        // ~11 m in 10 s
        let trust = a.ingest_sample(sample(-6.2001, 106.8167, 10_000)).unwrap();
        assert!(!trust.is_suspicious);
        let speed = trust.implied_speed_mps.unwrap();
        assert!(speed > 1.0 && speed < 1.2, "got {}", speed);
    }

    #[test]
    fn test_impossible_speed() {
        let mut a = analyzer();
        a.ingest_sample(sample(-6.2, 106.8167, 0)).unwrap();
        // ~1 km in 5 s, about 720 km/h
        let trust = a.ingest_sample(sample(-6.209, 106.8167, 5_000)).unwrap();
        assert!(trust.is_suspicious);
        assert!(trust.has(TrustReason::ImpossibleSpeed));
        assert!(trust.has(TrustReason::TeleportJump));
        assert_eq!(
            trust.reasons,
            vec![TrustReason::ImpossibleSpeed, TrustReason::TeleportJump]
        );
        assert!((trust.score - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_fast_but_short_is_not_teleport() {
        let mut a = analyzer();
        a.ingest_sample(sample(0.0, 0.0, 0)).unwrap();
        // ~111 m in 1 s: impossible speed, but well under the teleport floor
        let trust = a.ingest_sample(sample(0.001, 0.0, 1_000)).unwrap();
        assert!(trust.has(TrustReason::ImpossibleSpeed));
        assert!(!trust.has(TrustReason::TeleportJump));
    }

    #[test]
    fn test_teleport_respects_accuracy() {
        let mut a = analyzer();
        // ~1.1 km apart, but each fix claims 400 m accuracy
        a.ingest_sample(PositionSample::new(c(0.0, 0.0), 400.0, 0)).unwrap();
        let trust = a
            .ingest_sample(PositionSample::new(c(0.01, 0.0), 400.0, 5_000))
            .unwrap();
        assert!(trust.has(TrustReason::ImpossibleSpeed));
        assert!(!trust.has(TrustReason::TeleportJump));
    }

    #[test]
    fn test_same_timestamp_displacement() {
        let mut a = analyzer();
        a.ingest_sample(sample(0.0, 0.0, 1_000)).unwrap();
        let trust = a.ingest_sample(sample(0.001, 0.0, 1_000)).unwrap();
        assert!(trust.has(TrustReason::ImpossibleSpeed));

        // Jitter inside the reported accuracy is fine
        let mut b = analyzer();
        b.ingest_sample(sample(0.0, 0.0, 1_000)).unwrap();
        let trust = b.ingest_sample(sample(0.0001, 0.0, 1_000)).unwrap();
        assert!(!trust.is_suspicious);
    }

    #[test]
    fn test_jitter_within_accuracy_is_not_speed() {
        // ~15 m apart with 10 m accuracy each, same instant and 1 ms apart
        for dt in [0, 1] {
            let mut a = analyzer();
            a.ingest_sample(sample(0.0, 0.0, 1_000)).unwrap();
            let trust = a.ingest_sample(sample(0.000135, 0.0, 1_000 + dt)).unwrap();
            assert!(!trust.has(TrustReason::ImpossibleSpeed), "dt {} ms", dt);
        }

        // Only the part beyond the accuracy is timed: ~67 m in 1 s passes,
        // ~111 m in 1 s does not
        let mut a = analyzer();
        a.ingest_sample(sample(0.0, 0.0, 0)).unwrap();
        let trust = a.ingest_sample(sample(0.0006, 0.0, 1_000)).unwrap();
        assert!(!trust.has(TrustReason::ImpossibleSpeed));
        assert!((trust.implied_speed_mps.unwrap() - 66.7).abs() < 0.1);

        let mut b = analyzer();
        b.ingest_sample(sample(0.0, 0.0, 0)).unwrap();
        let trust = b.ingest_sample(sample(0.001, 0.0, 1_000)).unwrap();
        assert!(trust.has(TrustReason::ImpossibleSpeed));
    }

    #[test]
    fn test_config_is_kept() {
        let config = AnalyzerConfig {
            max_plausible_speed_mps: 30.0,
            ..AnalyzerConfig::default()
        };
        let a = PositionStreamAnalyzer::new(config.clone()).unwrap();
        assert_eq!(a.config(), &config);
    }

    #[test]
    fn test_accuracy_implausible() {
        let mut a = analyzer();
        for bad in [0.0, -1.0, f64::NAN, 50_000.0] {
            a.reset();
            let trust = a
                .ingest_sample(PositionSample::new(c(0.0, 0.0), bad, 0))
                .unwrap();
            assert_eq!(trust.reasons, vec![TrustReason::AccuracyImplausible]);
        }
    }

    #[test]
    fn test_mock_flag_alone_is_suspicious() {
        let mut a = analyzer();
        let trust = a
            .ingest_sample(sample(-6.2, 106.8167, 0).with_mocked(true))
            .unwrap();
        assert!(trust.is_suspicious);
        assert_eq!(trust.reasons, vec![TrustReason::MockFlagPresent]);
        assert_eq!(trust.score, 1.0);
    }

    #[test]
    fn test_frozen_with_speed() {
        let mut a = analyzer();
        let mut last = None;
        for i in 0..5u64 {
            let s = sample(-6.2, 106.8167, i * 10_000).with_speed(8.0);
            last = Some(a.ingest_sample(s).unwrap());
        }
        // 5 identical fixes over 40 s while claiming 8 m/s
        assert!(last.unwrap().has(TrustReason::StaleOrFrozen));
    }

    #[test]
    fn test_frozen_with_changing_heading() {
        let mut a = analyzer();
        let mut last = None;
        for i in 0..6u64 {
            let s = sample(-6.2, 106.8167, i * 8_000).with_heading((i * 15) as f64);
            last = Some(a.ingest_sample(s).unwrap());
        }
        assert_eq!(last.unwrap().reasons, vec![TrustReason::StaleOrFrozen]);
    }

    #[test]
    fn test_stationary_device_is_not_frozen() {
        let mut a = analyzer();
        for i in 0..10u64 {
            let s = sample(-6.2, 106.8167, i * 10_000).with_speed(0.0).with_heading(90.0);
            let trust = a.ingest_sample(s).unwrap();
            assert!(!trust.is_suspicious);
        }
    }

    #[test]
    fn test_frozen_needs_time_span() {
        let mut a = analyzer();
        let mut last = None;
        // 5 identical fixes over only 4 s
        for i in 0..5u64 {
            let s = sample(-6.2, 106.8167, i * 1_000).with_speed(8.0);
            last = Some(a.ingest_sample(s).unwrap());
        }
        assert!(!last.unwrap().has(TrustReason::StaleOrFrozen));
    }

    #[test]
    fn test_window_bounded_by_count_and_time() {
        let config = AnalyzerConfig {
            window_size: 4,
            frozen_min_samples: 3,
            window_seconds: 30.0,
            ..AnalyzerConfig::default()
        };
        let mut a = PositionStreamAnalyzer::new(config).unwrap();
        for i in 0..10u64 {
            a.ingest_sample(sample(0.0, 0.0, i * 1_000)).unwrap();
        }
        assert_eq!(a.window_len(), 4);

        // 60 s gap drops everything but the newest sample
        a.ingest_sample(sample(0.0, 0.0, 69_000)).unwrap();
        assert_eq!(a.window_len(), 1);
        assert_eq!(a.samples_seen(), 11);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut a = analyzer();
        a.ingest_sample(sample(-6.2, 106.8167, 0)).unwrap();
        a.reset();
        assert_eq!(a.window_len(), 0);
        assert!(a.last_assessment().is_none());

        // Without the old sample there is nothing to compare against
        let trust = a.ingest_sample(sample(-6.3, 106.8167, 1_000)).unwrap();
        assert!(!trust.is_suspicious);
    }

    #[test]
    fn test_signal_lost_reported() {
        let mut a = analyzer();
        a.ingest_sample(sample(0.0, 0.0, 0)).unwrap();
        a.report_signal_lost();
        assert!(a.is_signal_lost());

        assert!(matches!(
            a.ingest_sample(sample(0.0, 0.0, 1_000)),
            Err(EngineError::SignalLost { .. })
        ));
        assert!(matches!(
            a.current_assessment(1_000),
            Err(EngineError::SignalLost { .. })
        ));

        a.reset();
        assert!(a.ingest_sample(sample(0.0, 0.0, 2_000)).is_ok());
    }

    #[test]
    fn test_signal_silence_timeout() {
        let mut a = analyzer();
        assert_eq!(a.current_assessment(1_000_000).unwrap(), None);

        a.ingest_sample(sample(0.0, 0.0, 10_000)).unwrap();
        assert!(a.current_assessment(70_000).unwrap().is_some());
        assert_eq!(
            a.current_assessment(70_001),
            Err(EngineError::SignalLost {
                silent_for_ms: Some(60_001)
            })
        );
    }

    #[test]
    fn test_malformed_coordinate_rejected() {
        let mut a = analyzer();
        let result = a.ingest_sample(sample(123.0, 0.0, 0));
        assert!(matches!(result, Err(EngineError::Input(_))));
        assert_eq!(a.window_len(), 0);
        assert_eq!(a.samples_seen(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalyzerConfig {
            max_plausible_speed_mps: 0.0,
            ..AnalyzerConfig::default()
        };
        assert!(PositionStreamAnalyzer::new(config).is_err());
    }
}
