//! Structural analysis: beat grid, energy envelope, segment timeline
//!
//! The analyzer never fails on musical grounds. When the tempo cannot be
//! pinned down or the grid does not line up with the onsets, it returns a
//! profile with a single `unknown` segment, an empty grid and a
//! low-confidence tempo, and the planner treats that track conservatively.
//! A beat grid supplied alongside a trusted tempo is used as given and
//! skips onset fitting.

use crate::analysis::beatgrid::fit_grid;
use crate::analysis::key::CamelotKey;
use crate::analysis::onset::onset_envelope;
use crate::analysis::segments::{from_window_labels, is_contiguous_cover, snap_to_downbeats};
use crate::analysis::stratum::StratumEstimator;
use crate::analysis::traits::{TempoKeyEstimate, TempoKeyEstimator};
use crate::analysis::metadata::extract_metadata;
use crate::audio;
use crate::config::AnalysisConfig;
use crate::error::{MixError, Result};
use crate::types::{
    AudioBuffer, BeatGrid, EnergyEnvelope, Segment, SegmentKind, Tempo, TrackInput,
    TrackMetadata, TrackProfile,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Produces [`TrackProfile`]s from source audio and request hints
pub struct StructuralAnalyzer {
    config: AnalysisConfig,
    estimator: Arc<dyn TempoKeyEstimator>,
}

impl StructuralAnalyzer {
    pub fn new(config: AnalysisConfig, estimator: Arc<dyn TempoKeyEstimator>) -> Self {
        Self { config, estimator }
    }

    /// Analyzer backed by stratum-dsp estimation
    pub fn with_stratum(config: AnalysisConfig) -> Self {
        Self::new(config, Arc::new(StratumEstimator::new()))
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Decode and analyze one request entry
    pub fn analyze(&self, input: &TrackInput) -> Result<TrackProfile> {
        debug!("Analyzing: {}", input.source.display());
        let buffer = audio::decode(&input.source)?;
        let metadata = extract_metadata(&input.source);
        self.analyze_buffer(input, &buffer, metadata)
    }

    /// Analyze already-decoded audio
    pub fn analyze_buffer(
        &self,
        input: &TrackInput,
        buffer: &AudioBuffer,
        metadata: TrackMetadata,
    ) -> Result<TrackProfile> {
        let duration = buffer.duration;
        if duration < self.config.min_duration_seconds {
            return Err(MixError::AnalysisError {
                path: input.source.clone(),
                reason: format!(
                    "Audio too short ({:.1}s). Minimum {:.0}s required for structural analysis.",
                    duration, self.config.min_duration_seconds
                ),
            });
        }

        let hinted_key = input.key.as_deref().and_then(|code| {
            let parsed = CamelotKey::parse(code);
            if parsed.is_none() {
                warn!("Ignoring invalid key '{}' for {}", code, input.source.display());
            }
            parsed
        });
        let hinted_bpm = input.tempo_bpm.filter(|&bpm| self.tempo_in_range(bpm));
        if input.tempo_bpm.is_some() && hinted_bpm.is_none() {
            warn!(
                "Ignoring out-of-range tempo {:?} for {}",
                input.tempo_bpm,
                input.source.display()
            );
        }

        let estimate = if hinted_bpm.is_none() || hinted_key.is_none() {
            self.estimator.estimate(buffer).unwrap_or_else(|e| {
                warn!(
                    "{} estimation failed for {}: {}",
                    self.estimator.name(),
                    input.source.display(),
                    e
                );
                TempoKeyEstimate::empty()
            })
        } else {
            TempoKeyEstimate::empty()
        };

        let min_conf = self.config.min_estimate_confidence;
        let key = hinted_key.or(estimate.key.filter(|_| estimate.key_confidence >= min_conf));
        let estimated_bpm = estimate.bpm.filter(|&bpm| self.tempo_in_range(bpm));
        let trusted_bpm = hinted_bpm.or(estimated_bpm.filter(|_| estimate.bpm_confidence >= min_conf));

        let envelope = energy_envelope(buffer, self.config.window_seconds);
        let energy = input
            .energy
            .map(|e| e.clamp(0.0, 1.0))
            .unwrap_or_else(|| overall_energy(buffer, &envelope));
        let genre = input.genre.clone().or_else(|| metadata.genre.clone());

        let mut profile = TrackProfile::from_parts(
            input.source.clone(),
            duration,
            Tempo::uncertain(trusted_bpm.or(estimated_bpm).unwrap_or(0.0)),
            key,
            energy,
            genre.as_deref(),
            Vec::new(),
        );
        profile.metadata = metadata;
        profile.energy_envelope = envelope;

        let Some(bpm) = trusted_bpm else {
            warn!(
                "Tempo undetectable for {}; treating structure as unknown",
                input.source.display()
            );
            return Ok(profile);
        };

        let supplied = supplied_grid(input, bpm, duration);

        // Precomputed structure from the request wins when it is usable
        if let Some(segments) = input.segments.as_ref() {
            if is_contiguous_cover(segments, duration) {
                profile.tempo = Tempo::confident(bpm);
                profile.beat_grid = supplied.unwrap_or_else(|| BeatGrid::regular(bpm, 0.0, duration));
                profile.segments = segments.clone();
                return Ok(profile);
            }
            warn!(
                "Precomputed segments for {} do not cover [0, {:.1}); re-analyzing",
                input.source.display(),
                duration
            );
        }

        // A supplied downbeat grid is taken as given; only a fitted one is gated
        let grid = match supplied {
            Some(grid) => grid,
            None => {
                let onsets = onset_envelope(&buffer.samples, buffer.sample_rate);
                match fit_grid(&onsets, bpm, duration) {
                    Some(fit) if fit.confidence >= self.config.min_grid_confidence => fit.grid,
                    other => {
                        warn!(
                            "Beat grid unreliable for {} (confidence {:.2}); treating structure as unknown",
                            input.source.display(),
                            other.map(|f| f.confidence).unwrap_or(0.0)
                        );
                        return Ok(profile);
                    }
                }
            }
        };

        profile.tempo = Tempo::confident(bpm);
        profile.beat_grid = grid;
        profile.segments = classify(&profile.energy_envelope, bpm, duration, &self.config);
        profile.segments = snap_to_downbeats(
            std::mem::take(&mut profile.segments),
            &profile.beat_grid,
            profile.tempo.bar_seconds() / 2.0,
        );

        debug!(
            "Structure of {}: {}",
            input.source.display(),
            profile
                .segments
                .iter()
                .map(|s| format!("{}[{:.1}-{:.1}]", s.kind, s.start, s.end))
                .collect::<Vec<_>>()
                .join(" ")
        );

        Ok(profile)
    }

    fn tempo_in_range(&self, bpm: f64) -> bool {
        bpm.is_finite() && bpm >= self.config.min_tempo_bpm && bpm <= self.config.max_tempo_bpm
    }
}

/// Downbeats from the request, sorted and limited to the track, if any remain
fn supplied_grid(input: &TrackInput, bpm: f64, duration: f64) -> Option<BeatGrid> {
    let mut downbeats: Vec<f64> = input
        .beat_grid
        .as_ref()?
        .iter()
        .copied()
        .filter(|t| t.is_finite() && *t >= 0.0 && *t <= duration)
        .collect();
    if downbeats.is_empty() {
        return None;
    }
    downbeats.sort_by(|a, b| a.total_cmp(b));
    downbeats.dedup();
    Some(BeatGrid {
        tempo_bpm: bpm,
        downbeats,
    })
}

/// RMS per window, peak-normalized, smoothed over three windows
pub fn energy_envelope(buffer: &AudioBuffer, window_seconds: f64) -> EnergyEnvelope {
    let window = ((window_seconds * buffer.sample_rate as f64).round() as usize).max(1);
    let rms: Vec<f32> = buffer
        .samples
        .chunks(window)
        .map(|chunk| (chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32).sqrt())
        .collect();

    let smoothed: Vec<f32> = (0..rms.len())
        .map(|i| {
            let lo = i.saturating_sub(1);
            let hi = (i + 2).min(rms.len());
            rms[lo..hi].iter().sum::<f32>() / (hi - lo) as f32
        })
        .collect();

    let peak = smoothed.iter().copied().fold(0.0f32, f32::max);
    let values = if peak > 0.0 {
        smoothed.iter().map(|v| v / peak).collect()
    } else {
        smoothed
    };

    EnergyEnvelope {
        window_seconds,
        values,
    }
}

/// Overall track energy in [0, 1]
///
/// Mostly absolute loudness (-30 dBFS RMS maps to 0, -5 dBFS to 1), with a
/// share of how much of the track sits near its own peak.
pub fn overall_energy(buffer: &AudioBuffer, envelope: &EnergyEnvelope) -> f64 {
    if buffer.is_empty() {
        return 0.0;
    }
    let rms = (buffer.samples.iter().map(|s| (*s as f64).powi(2)).sum::<f64>()
        / buffer.len() as f64)
        .sqrt();
    let db = if rms > 0.0 { 20.0 * rms.log10() } else { -120.0 };
    let loudness = ((db + 30.0) / 25.0).clamp(0.0, 1.0);

    let density = if envelope.values.is_empty() {
        0.0
    } else {
        envelope.values.iter().map(|&v| v as f64).sum::<f64>() / envelope.values.len() as f64
    };

    (0.7 * loudness + 0.3 * density).clamp(0.0, 1.0)
}

/// Label every energy window and merge into segments
pub fn classify(
    envelope: &EnergyEnvelope,
    bpm: f64,
    duration: f64,
    config: &AnalysisConfig,
) -> Vec<Segment> {
    let e = &envelope.values;
    let n = e.len();
    let w = envelope.window_seconds;
    if n == 0 || w <= 0.0 {
        return vec![Segment::new(SegmentKind::Unknown, 0.0, duration, 0.0)];
    }

    let lookback = ((config.rise_lookback_seconds / w).ceil() as usize).max(1);
    let sustain = ((config.drop_sustain_beats * 60.0 / bpm / w).ceil() as usize).max(1);
    let drop_level = config.drop_min_level as f32;
    let mut labels = vec![SegmentKind::Verse; n];

    // Drops: sustained high-energy runs entered through a rise
    let mut drops: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < n {
        if e[i] < drop_level {
            i += 1;
            continue;
        }
        let mut end = i;
        while end < n && e[end] >= drop_level {
            end += 1;
        }
        let floor = e[i.saturating_sub(lookback)..i]
            .iter()
            .copied()
            .fold(f32::MAX, f32::min);
        let rose = i > 0 && (e[i] - floor) as f64 >= config.drop_rise_threshold;
        if rose && end - i >= sustain {
            drops.push((i, end));
            for label in &mut labels[i..end] {
                *label = SegmentKind::Drop;
            }
        }
        i = end;
    }

    // Breakdowns: sustained dips after a drop, until the next rise
    for (idx, &(start, end)) in drops.iter().enumerate() {
        let drop_avg = e[start..end].iter().sum::<f32>() / (end - start) as f32;
        let threshold = drop_avg * config.breakdown_ratio as f32;
        let limit = drops.get(idx + 1).map(|d| d.0).unwrap_or(n);
        let mut j = end;
        while j < limit && e[j] < threshold {
            j += 1;
        }
        if j - end >= 2 {
            for label in &mut labels[end..j] {
                *label = SegmentKind::Breakdown;
            }
        }
    }

    // Buildups: the rising stretch right before each drop
    for &(start, _) in &drops {
        let mut j = start;
        while j > 0 && e[j - 1] < drop_level && e[j - 1] < e[j] - 0.005 {
            j -= 1;
        }
        if start - j >= 2 && (e[start - 1] - e[j]) >= 0.1 {
            for label in &mut labels[j..start] {
                *label = SegmentKind::Buildup;
            }
        }
    }

    // Intro/outro: low-energy edges not already claimed
    let edge_level = config.edge_level as f32;
    let max_edge = ((n as f64 * config.max_edge_fraction).floor() as usize).max(1);
    let mut k = 0;
    while k < n && k < max_edge && labels[k] == SegmentKind::Verse && e[k] < edge_level {
        labels[k] = SegmentKind::Intro;
        k += 1;
    }
    let mut k = n;
    while k > 0
        && n - k < max_edge
        && matches!(labels[k - 1], SegmentKind::Verse | SegmentKind::Breakdown)
        && e[k - 1] < edge_level
    {
        labels[k - 1] = SegmentKind::Outro;
        k -= 1;
    }

    from_window_labels(&labels, e, w, duration)
}
