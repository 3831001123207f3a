//! Downbeat grid fitting
//!
//! The tempo is known (tagged or estimated); only the phase is searched.
//! Beats sit where the onset envelope is strongest on a fixed period, and
//! the downbeat is whichever of the four beat phases carries the most
//! onset energy at bar spacing.

use crate::analysis::onset::OnsetEnvelope;
use crate::types::BeatGrid;
use tracing::debug;

/// Result of fitting a grid to an onset envelope
#[derive(Debug, Clone)]
pub struct GridFit {
    pub grid: BeatGrid,
    /// Time of the first beat (not necessarily a downbeat)
    pub beat_phase: f64,
    /// Mean on-grid onset strength divided by the overall mean
    pub confidence: f64,
}

/// Fit a downbeat grid at `bpm` to the onset envelope
///
/// Returns `None` when the envelope is empty or the tempo is not usable.
pub fn fit_grid(onsets: &OnsetEnvelope, bpm: f64, duration: f64) -> Option<GridFit> {
    if onsets.is_empty() || !(bpm.is_finite() && bpm > 0.0) || duration <= 0.0 {
        return None;
    }

    let beat = 60.0 / bpm;
    let span = onsets.duration().min(duration);
    if span < beat * 4.0 {
        return None;
    }

    // Phase search at hop resolution across one beat period
    let steps = ((beat / onsets.hop_seconds).ceil() as usize).max(1);
    let mut best_phase = 0.0;
    let mut best_score = f64::MIN;
    for step in 0..steps {
        let phase = step as f64 * onsets.hop_seconds;
        if phase >= beat {
            break;
        }
        let score = comb_sum(onsets, phase, beat, span);
        if score > best_score + 1e-9 {
            best_score = score;
            best_phase = phase;
        }
    }

    // Downbeat: which beat of the bar carries the most onset energy
    let bar = beat * 4.0;
    let mut downbeat_offset = 0usize;
    let mut best_bar_score = f64::MIN;
    for offset in 0..4 {
        let score = comb_sum(onsets, best_phase + offset as f64 * beat, bar, span);
        if score > best_bar_score + 1e-9 {
            best_bar_score = score;
            downbeat_offset = offset;
        }
    }

    let beats_on_grid = ((span - best_phase) / beat).floor().max(0.0) + 1.0;
    let on_grid_mean = best_score / beats_on_grid;
    let overall_mean = onsets.mean();
    let confidence = if overall_mean > 0.0 {
        on_grid_mean / overall_mean
    } else {
        0.0
    };

    let first_downbeat = best_phase + downbeat_offset as f64 * beat;
    debug!(
        "Grid fit: {:.2} BPM, beat phase {:.3}s, downbeat {:.3}s, confidence {:.2}",
        bpm, best_phase, first_downbeat, confidence
    );

    Some(GridFit {
        grid: BeatGrid::regular(bpm, first_downbeat, duration),
        beat_phase: best_phase,
        confidence,
    })
}

/// Sum of onset strength sampled every `period` seconds from `phase`
///
/// Each sample takes the max over +/- one hop to tolerate rounding.
fn comb_sum(onsets: &OnsetEnvelope, phase: f64, period: f64, span: f64) -> f64 {
    let mut total = 0.0;
    let mut t = phase;
    while t < span {
        let v = onsets
            .at(t)
            .max(onsets.at(t - onsets.hop_seconds))
            .max(onsets.at(t + onsets.hop_seconds));
        total += v as f64;
        t += period;
    }
    total
}
