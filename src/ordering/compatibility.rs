//! Pairwise transition compatibility (0 - 100)
//!
//! Three components, weighted by [`OrderingConfig`]:
//! - harmonic: Camelot wheel relation
//! - tempo: within the genre tolerance, or a half/double-time match
//! - energy: fit to the target curve, or closeness of the two energies
//!
//! Components that cannot be measured (missing key, low-confidence tempo)
//! score the configured low-certainty floor instead of being skipped, so
//! uncertain tracks stay in the set but rank last.

use crate::analysis::key::HarmonicRelation;
use crate::config::OrderingConfig;
use crate::types::TrackProfile;
use serde::{Deserialize, Serialize};

/// Breakdown of one directed pair score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairCompatibility {
    pub harmonic: f64,
    pub tempo: f64,
    pub energy: f64,
    /// Weighted total
    pub total: f64,
}

/// Harmonic component for a transition `from -> to`
pub fn harmonic_score(from: &TrackProfile, to: &TrackProfile, config: &OrderingConfig) -> f64 {
    HarmonicRelation::between(from.key, to.key).score(config.low_certainty_score)
}

/// Tempo component
pub fn tempo_score(from: &TrackProfile, to: &TrackProfile, config: &OrderingConfig) -> f64 {
    if !from.tempo.is_confident() || !to.tempo.is_confident() {
        return config.low_certainty_score;
    }
    let (a, b) = (from.tempo.bpm, to.tempo.bpm);
    if a <= 0.0 || b <= 0.0 {
        return config.low_certainty_score;
    }

    let tolerance = config.pair_tempo_tolerance(from.genre.as_deref(), to.genre.as_deref());
    let percent = (a - b).abs() / ((a + b) / 2.0) * 100.0;
    let direct = if percent <= tolerance {
        100.0
    } else {
        (100.0 - config.tempo_decay_per_percent * (percent - tolerance)).max(0.0)
    };

    let ratio = a.max(b) / a.min(b);
    let double_off = (ratio - 2.0).abs() / 2.0 * 100.0;
    let half_double = if double_off <= tolerance {
        config.half_double_score
    } else {
        0.0
    };

    direct.max(half_double)
}

/// Energy component; `target` is the curve value at this position, if any
pub fn energy_score(from: &TrackProfile, to: &TrackProfile, target: Option<f64>) -> f64 {
    let distance = match target {
        Some(t) => ((from.energy + to.energy) / 2.0 - t).abs(),
        None => (from.energy - to.energy).abs(),
    };
    (100.0 * (1.0 - distance)).clamp(0.0, 100.0)
}

/// Full weighted score for `from -> to`
pub fn pair_compatibility(
    from: &TrackProfile,
    to: &TrackProfile,
    config: &OrderingConfig,
    energy_target: Option<f64>,
) -> PairCompatibility {
    let harmonic = harmonic_score(from, to, config);
    let tempo = tempo_score(from, to, config);
    let energy = energy_score(from, to, energy_target);
    let weights = config.harmonic_weight + config.tempo_weight + config.energy_weight;
    let total = if weights > 0.0 {
        (config.harmonic_weight * harmonic
            + config.tempo_weight * tempo
            + config.energy_weight * energy)
            / weights
    } else {
        0.0
    };
    PairCompatibility {
        harmonic,
        tempo,
        energy,
        total,
    }
}
