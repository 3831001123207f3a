//! Tempo correction policy
//!
//! The incoming track is time-stretched towards the outgoing tempo when the
//! mismatch is audible but small enough to stretch cleanly. Half/double-time
//! pairs are compared after folding the ratio into [0.75, 1.5].

use crate::config::PlannerConfig;
use crate::types::Tempo;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TempoDecision {
    /// Close enough that beats do not audibly drift over the overlap
    InSync { percent: f64 },
    /// Stretch the incoming lead-in by `factor` (speed multiplier)
    Stretch { factor: f64, percent: f64 },
    /// Mismatch too large to stretch without artifacts
    Rejected { percent: f64 },
    /// At least one tempo is not trusted; no correction attempted
    Unknown,
}

impl TempoDecision {
    pub fn stretch_factor(&self) -> Option<f64> {
        match self {
            TempoDecision::Stretch { factor, .. } => Some(*factor),
            _ => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, TempoDecision::Rejected { .. })
    }
}

/// Ratio of outgoing to incoming tempo, folded for half/double time
pub fn folded_ratio(from_bpm: f64, to_bpm: f64) -> f64 {
    let mut ratio = from_bpm / to_bpm;
    while ratio > 1.5 {
        ratio /= 2.0;
    }
    while ratio < 0.75 {
        ratio *= 2.0;
    }
    ratio
}

/// Decide how to reconcile the tempos of `from -> to`
pub fn decide(from: &Tempo, to: &Tempo, config: &PlannerConfig) -> TempoDecision {
    if !from.is_confident() || !to.is_confident() || from.bpm <= 0.0 || to.bpm <= 0.0 {
        return TempoDecision::Unknown;
    }

    let ratio = folded_ratio(from.bpm, to.bpm);
    let percent = (ratio - 1.0).abs() * 100.0;

    if percent <= config.float_threshold_percent {
        TempoDecision::InSync { percent }
    } else if percent <= config.max_stretch_percent {
        TempoDecision::Stretch {
            factor: ratio,
            percent,
        }
    } else {
        TempoDecision::Rejected { percent }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide_bpm(a: f64, b: f64) -> TempoDecision {
        decide(&Tempo::confident(a), &Tempo::confident(b), &PlannerConfig::default())
    }

    #[test]
    fn test_tiny_mismatch_floats() {
        assert!(matches!(decide_bpm(128.0, 128.2), TempoDecision::InSync { .. }));
    }

    #[test]
    fn test_moderate_mismatch_stretches_incoming() {
        let decision = decide_bpm(128.0, 124.0);
        let factor = decision.stretch_factor().unwrap();
        assert!((factor - 128.0 / 124.0).abs() < 1e-12);
    }

    #[test]
    fn test_large_mismatch_is_rejected() {
        assert!(decide_bpm(128.0, 100.0).is_rejected());
    }

    #[test]
    fn test_double_time_folds() {
        assert!(matches!(decide_bpm(87.0, 174.0), TempoDecision::InSync { .. }));
        assert!((folded_ratio(174.0, 87.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_uncertain_tempo_is_unknown() {
        let d = decide(&Tempo::uncertain(0.0), &Tempo::confident(128.0), &PlannerConfig::default());
        assert_eq!(d, TempoDecision::Unknown);
    }
}
