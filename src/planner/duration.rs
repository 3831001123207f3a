//! Crossfade duration selection
//!
//! genre range -> reach -> energy scaling -> bars at the pair tempo ->
//! nearest multiple of four bars -> clamp to [min_bars, max_bars].

use crate::config::{DurationRange, PlannerConfig};
use crate::planner::rules::Reach;

/// Tempo assumed for bar arithmetic when neither track has a trusted tempo
pub const NOMINAL_BPM: f64 = 120.0;

/// A duration expressed both ways
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhraseDuration {
    pub seconds: f64,
    pub bars: u32,
}

/// Pick the base length for `reach` and scale it by the energy change
///
/// Lengthening for a near-flat energy change never exceeds the range's
/// longest value.
pub fn base_seconds(reach: Reach, range: DurationRange, energy_delta: f64, config: &PlannerConfig) -> f64 {
    let base = match reach {
        Reach::Cut => return config.quick_cut_seconds,
        Reach::Shortest => range.shortest,
        Reach::Standard => range.midpoint(),
        Reach::Longest => range.longest,
    };
    let magnitude = energy_delta.abs();
    if magnitude > config.high_energy_delta {
        base * config.high_delta_scale
    } else if magnitude < config.flat_energy_delta {
        (base * config.flat_delta_scale).min(range.longest.max(base))
    } else {
        base
    }
}

/// Round `seconds` to a phrase-aligned bar count at `bar_seconds`
pub fn to_phrase(seconds: f64, bar_seconds: f64, config: &PlannerConfig) -> PhraseDuration {
    let raw_bars = if bar_seconds > 0.0 { seconds / bar_seconds } else { 0.0 };
    let rounded = ((raw_bars / 4.0).round() * 4.0) as i64;
    let bars = rounded.clamp(config.min_bars as i64, config.max_bars as i64) as u32;
    PhraseDuration {
        seconds: bars as f64 * bar_seconds,
        bars,
    }
}

/// Quick-cut overlap: never longer than one bar or the configured cut
pub fn quick_cut(bar_seconds: f64, config: &PlannerConfig) -> PhraseDuration {
    PhraseDuration {
        seconds: config.quick_cut_seconds.min(bar_seconds).min(2.0),
        bars: config.min_bars,
    }
}

/// Largest phrase-aligned duration that fits in `available` seconds
///
/// Falls back to the raw available length (reported as the minimum bar
/// count) when not even `min_bars` fit.
pub fn shrink_to_fit(available: f64, bar_seconds: f64, config: &PlannerConfig) -> PhraseDuration {
    let fitting_bars = if bar_seconds > 0.0 {
        ((available / bar_seconds / 4.0).floor() * 4.0) as i64
    } else {
        0
    };
    if fitting_bars >= config.min_bars as i64 {
        let bars = fitting_bars.min(config.max_bars as i64) as u32;
        PhraseDuration {
            seconds: bars as f64 * bar_seconds,
            bars,
        }
    } else {
        PhraseDuration {
            seconds: available.max(0.0),
            bars: config.min_bars,
        }
    }
}
