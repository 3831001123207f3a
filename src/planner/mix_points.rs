//! Cue point selection
//!
//! The cue-out of the outgoing track is where its fade starts; the cue-in of
//! the incoming track is where it is fully established. Both derive from the
//! adjacent segment boundary and snap to a downbeat inside that segment,
//! preferring the side that keeps the planned overlap feasible.

use crate::config::PlannerConfig;
use crate::types::TrackProfile;

/// A chosen cue point and how it was found
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CuePoint {
    pub seconds: f64,
    /// True when the point came from the duration-fraction fallback
    pub fallback: bool,
}

/// Cue-out for `overlap` seconds of fade, never before `floor`
pub fn cue_out(profile: &TrackProfile, overlap: f64, floor: f64, config: &PlannerConfig) -> CuePoint {
    let duration = profile.duration;
    let floor = floor.clamp(0.0, duration);

    let (target, lo, fallback) = match profile.last_segment() {
        Some(last) if !profile.is_unstructured() => {
            ((duration - overlap).max(last.start), last.start, false)
        }
        _ => (duration * config.fallback_mix_out_fraction, 0.0, true),
    };
    let target = target.clamp(floor, duration);
    let lo = lo.max(floor);

    // Latest downbeat not after the target keeps the whole overlap in range
    let snapped = profile
        .beat_grid
        .nearest_within(target, lo, target)
        .or_else(|| profile.beat_grid.nearest_within(target, lo, duration))
        .filter(|&t| t < duration)
        .unwrap_or(target);

    CuePoint {
        seconds: snapped.max(floor),
        fallback,
    }
}

/// Cue-in leaving `lead_in` seconds of source material before it
pub fn cue_in(profile: &TrackProfile, lead_in: f64, config: &PlannerConfig) -> CuePoint {
    let duration = profile.duration;

    let (target, hi, fallback) = match profile.first_segment() {
        Some(first) if !profile.is_unstructured() => (lead_in.min(first.end), first.end, false),
        _ => (duration * (1.0 - config.fallback_mix_out_fraction), duration, true),
    };
    let target = target.clamp(0.0, duration);

    // Earliest downbeat not before the target keeps the lead-in long enough
    let snapped = profile
        .beat_grid
        .nearest_within(target, target, hi)
        .or_else(|| profile.beat_grid.nearest_within(target, 0.0, hi))
        .filter(|&t| t > 0.0)
        .unwrap_or(target);

    CuePoint {
        seconds: snapped.clamp(0.0, duration),
        fallback,
    }
}
