//! Transition planning
//!
//! Pure and deterministic: given the same ordered profiles and config the
//! planner emits byte-identical plans. Every adjustment it makes (shrinking
//! an infeasible overlap, refusing a large time-stretch, falling back to a
//! duration-fraction cue) is logged and recorded in the plan's rationale.

pub mod duration;
pub mod mix_points;
pub mod rules;
pub mod tempo;

pub use rules::{EnergyBand, Reach, TransitionStyle};
pub use tempo::TempoDecision;

use crate::analysis::key::HarmonicRelation;
use crate::config::{MixConfig, PlannerConfig};
use crate::types::{SegmentKind, TrackProfile};
use duration::{base_seconds, quick_cut, shrink_to_fit, to_phrase, PhraseDuration, NOMINAL_BPM};
use rules::RuleInput;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why a transition looks the way it does. Diagnostic only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rationale {
    /// Name of the rule-table row that matched
    pub rule: String,
    pub out_segment: SegmentKind,
    pub in_segment: SegmentKind,
    pub harmonic_relation: HarmonicRelation,
    /// Incoming minus outgoing energy
    pub energy_delta: f64,
    pub energy_band: EnergyBand,
    pub tempo: TempoDecision,
    /// Adjustments applied after the rule matched
    pub notes: Vec<String>,
}

/// Declarative description of one transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionPlan {
    /// Position of the outgoing track in the mix
    pub from: usize,
    /// Position of the incoming track in the mix
    pub to: usize,
    pub from_title: String,
    pub to_title: String,
    pub style: TransitionStyle,
    pub duration_seconds: f64,
    /// Always a multiple of 4 within [4, 64]
    pub duration_bars: u32,
    /// Bar length the bar count was computed at
    pub bar_seconds: f64,
    pub harmonic_score: f64,
    /// Outgoing cue-out, seconds into the outgoing track
    pub mix_out_point: f64,
    /// Incoming cue-in, seconds into the incoming track
    pub mix_in_point: f64,
    /// Speed multiplier applied to the incoming lead-in
    pub tempo_stretch: Option<f64>,
    pub rationale: Rationale,
}

impl TransitionPlan {
    /// Source seconds of the incoming track consumed by the overlap
    pub fn lead_in_seconds(&self) -> f64 {
        self.duration_seconds * self.tempo_stretch.unwrap_or(1.0)
    }

    /// Fallback used when rendering this plan fails: linear blend at the
    /// minimum phrase length, no stretch, same cue points
    pub fn simplified(&self, min_bars: u32) -> TransitionPlan {
        let mut plan = self.clone();
        let minimum = self.bar_seconds * min_bars as f64;
        plan.style = TransitionStyle::LinearBlend;
        if plan.duration_seconds > minimum {
            plan.duration_seconds = minimum;
            plan.duration_bars = min_bars;
        }
        plan.tempo_stretch = None;
        // Unstretched, the lead-in consumes the whole overlap
        if plan.duration_seconds > plan.mix_in_point {
            plan.duration_seconds = plan.mix_in_point.max(0.0);
            plan.duration_bars = min_bars;
        }
        plan.rationale.notes.push(format!(
            "simplified after render failure: {} over {:.2}s, no stretch",
            plan.style, plan.duration_seconds
        ));
        plan
    }
}

/// One track of the mix with its resolved cue points
#[derive(Debug, Clone, Serialize)]
pub struct MixEntry {
    #[serde(skip)]
    pub profile: Arc<TrackProfile>,
    pub source: std::path::PathBuf,
    pub title: String,
    /// Material before this point is discarded (0 for the first track)
    pub mix_in_point: f64,
    /// Material after the fade that starts here is discarded (duration for
    /// the last track)
    pub mix_out_point: f64,
}

/// Ordered tracks plus one plan per adjacent pair
#[derive(Debug, Clone, Serialize)]
pub struct MixPlan {
    pub entries: Vec<MixEntry>,
    pub transitions: Vec<TransitionPlan>,
}

impl MixPlan {
    /// Length of the rendered mix, before loudness processing
    pub fn expected_duration(&self) -> f64 {
        let played: f64 = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let end = if i + 1 == self.entries.len() {
                    e.profile.duration
                } else {
                    e.mix_out_point
                };
                end - e.mix_in_point
            })
            .sum();
        // Each incoming lead-in overlaps the outgoing fade
        let fades: f64 = self.transitions.iter().map(|t| t.duration_seconds).sum();
        played + fades
    }
}

/// Builds transition plans from ordered profiles
pub struct TransitionPlanner {
    config: PlannerConfig,
    unknown_key_score: f64,
}

impl TransitionPlanner {
    pub fn new(config: PlannerConfig, unknown_key_score: f64) -> Self {
        Self {
            config,
            unknown_key_score,
        }
    }

    pub fn from_config(config: &MixConfig) -> Self {
        Self::new(config.planner.clone(), config.ordering.low_certainty_score)
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan the whole mix in play order
    pub fn plan_mix(&self, ordered: &[Arc<TrackProfile>]) -> MixPlan {
        let mut transitions = Vec::with_capacity(ordered.len().saturating_sub(1));
        let mut mix_in = 0.0;
        let mut entries = Vec::with_capacity(ordered.len());

        for (i, profile) in ordered.iter().enumerate() {
            let mix_out = match ordered.get(i + 1) {
                Some(next) => {
                    let plan = self.plan_pair(i, profile, next, mix_in);
                    let out = plan.mix_out_point;
                    let next_in = plan.mix_in_point;
                    transitions.push(plan);
                    entries.push(MixEntry {
                        profile: Arc::clone(profile),
                        source: profile.source.clone(),
                        title: profile.display_name(),
                        mix_in_point: mix_in,
                        mix_out_point: out,
                    });
                    mix_in = next_in;
                    continue;
                }
                None => profile.duration,
            };
            entries.push(MixEntry {
                profile: Arc::clone(profile),
                source: profile.source.clone(),
                title: profile.display_name(),
                mix_in_point: mix_in,
                mix_out_point: mix_out,
            });
        }

        info!(
            "Planned {} transitions across {} tracks",
            transitions.len(),
            entries.len()
        );
        MixPlan {
            entries,
            transitions,
        }
    }

    /// Plan the transition from the track at `index` into the next one.
    /// `from_mix_in` is the outgoing track's own cue-in; its cue-out never
    /// precedes it.
    pub fn plan_pair(
        &self,
        index: usize,
        from: &TrackProfile,
        to: &TrackProfile,
        from_mix_in: f64,
    ) -> TransitionPlan {
        let cfg = &self.config;
        let out_segment = from.last_segment().map(|s| s.kind).unwrap_or(SegmentKind::Unknown);
        let in_segment = to.first_segment().map(|s| s.kind).unwrap_or(SegmentKind::Unknown);
        let relation = HarmonicRelation::between(from.key, to.key);
        let energy_delta = to.energy - from.energy;
        let energy_band = EnergyBand::classify(energy_delta, cfg.low_energy_delta, cfg.high_energy_delta);

        let rule = rules::select(&RuleInput {
            out_kind: out_segment,
            in_kind: in_segment,
            relation,
            energy: energy_band,
        });
        let mut style = rule.style;
        let mut reach = rule.reach;
        let mut notes = Vec::new();

        let tempo = tempo::decide(&from.tempo, &to.tempo, cfg);
        let mut stretch = tempo.stretch_factor();
        if let TempoDecision::Rejected { percent } = tempo {
            stretch = None;
            if style != TransitionStyle::QuickCut {
                warn!(
                    "Tempo mismatch {:.1}% between '{}' and '{}' is too large to stretch; using a short linear blend",
                    percent,
                    from.display_name(),
                    to.display_name()
                );
                style = TransitionStyle::LinearBlend;
                reach = Reach::Shortest;
            }
            notes.push(format!(
                "tempo mismatch {:.1}% exceeds {:.1}% stretch limit; no stretch",
                percent, cfg.max_stretch_percent
            ));
        }
        if style == TransitionStyle::QuickCut && stretch.take().is_some() {
            notes.push("quick cut plays unstretched".to_string());
        }
        if let TempoDecision::Unknown = tempo {
            notes.push("tempo not trusted on both sides; no correction".to_string());
        }

        // A stretched lead-in plays at the outgoing tempo, so the overlap is
        // counted in outgoing bars and the lead-in in whole incoming bars
        let bar_seconds = match stretch {
            Some(_) => from.tempo.bar_seconds(),
            None => 240.0 / pair_bpm(from, to),
        };
        let range = cfg.pair_durations(from.genre.as_deref(), to.genre.as_deref());
        let mut phrase = if reach == Reach::Cut {
            let cut = quick_cut(bar_seconds, cfg);
            notes.push(format!(
                "quick cut over {:.2}s, reported as {} bars",
                cut.seconds, cut.bars
            ));
            cut
        } else {
            to_phrase(base_seconds(reach, range, energy_delta, cfg), bar_seconds, cfg)
        };

        let factor = stretch.unwrap_or(1.0);
        let out_cue = mix_points::cue_out(from, phrase.seconds, from_mix_in, cfg);
        let in_cue = mix_points::cue_in(to, phrase.seconds * factor, cfg);
        if out_cue.fallback {
            notes.push(format!(
                "no structure for '{}'; cue-out at {:.0}% of duration",
                from.display_name(),
                cfg.fallback_mix_out_fraction * 100.0
            ));
        }
        if in_cue.fallback {
            notes.push(format!(
                "no structure for '{}'; cue-in at {:.0}% of duration",
                to.display_name(),
                (1.0 - cfg.fallback_mix_out_fraction) * 100.0
            ));
        }

        let available = (from.duration - out_cue.seconds)
            .min(in_cue.seconds / factor)
            .min(in_cue.seconds)
            .max(0.0);
        if phrase.seconds > available {
            let requested = phrase;
            phrase = if style == TransitionStyle::QuickCut {
                PhraseDuration {
                    seconds: available,
                    bars: requested.bars,
                }
            } else {
                shrink_to_fit(available, bar_seconds, cfg)
            };
            warn!(
                "Transition {} -> {}: {:.2}s ({} bars) does not fit in {:.2}s; shrunk to {:.2}s ({} bars)",
                index,
                index + 1,
                requested.seconds,
                requested.bars,
                available,
                phrase.seconds,
                phrase.bars
            );
            notes.push(format!(
                "shrunk from {} bars ({:.2}s) to fit {:.2}s available",
                requested.bars, requested.seconds, available
            ));
        }

        let plan = TransitionPlan {
            from: index,
            to: index + 1,
            from_title: from.display_name(),
            to_title: to.display_name(),
            style,
            duration_seconds: phrase.seconds,
            duration_bars: phrase.bars,
            bar_seconds,
            harmonic_score: relation.score(self.unknown_key_score),
            mix_out_point: out_cue.seconds,
            mix_in_point: in_cue.seconds,
            tempo_stretch: stretch,
            rationale: Rationale {
                rule: rule.name.to_string(),
                out_segment,
                in_segment,
                harmonic_relation: relation,
                energy_delta,
                energy_band,
                tempo,
                notes,
            },
        };

        debug!(
            "Transition {} -> {}: {} via rule '{}', {:.2}s / {} bars, out {:.2}s, in {:.2}s",
            plan.from,
            plan.to,
            plan.style,
            plan.rationale.rule,
            plan.duration_seconds,
            plan.duration_bars,
            plan.mix_out_point,
            plan.mix_in_point
        );
        plan
    }
}

/// Average of the trusted tempos of a pair, or a nominal tempo
fn pair_bpm(from: &TrackProfile, to: &TrackProfile) -> f64 {
    let trusted: Vec<f64> = [&from.tempo, &to.tempo]
        .iter()
        .filter(|t| t.is_confident() && t.bpm > 0.0)
        .map(|t| t.bpm)
        .collect();
    if trusted.is_empty() {
        NOMINAL_BPM
    } else {
        trusted.iter().sum::<f64>() / trusted.len() as f64
    }
}
