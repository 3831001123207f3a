//! Transition style rule table
//!
//! Rules are data: each row names the segment pairing, harmonic relation and
//! energy band it matches, plus the style and overlap reach it selects. The
//! table is evaluated top to bottom once per pair and the first match wins;
//! the last row matches everything.

use crate::analysis::key::HarmonicRelation;
use crate::types::SegmentKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a transition is realized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionStyle {
    /// Animated high-pass sweep on the outgoing track
    FilterSweep,
    /// Bass hand-off between the two tracks at the midpoint
    EqSwap,
    /// Minimal overlap, at most two seconds
    QuickCut,
    /// Long exponential blend
    ExponentialBlend,
    /// Plain linear crossfade
    LinearBlend,
}

impl TransitionStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionStyle::FilterSweep => "filter-sweep",
            TransitionStyle::EqSwap => "eq-swap",
            TransitionStyle::QuickCut => "quick-cut",
            TransitionStyle::ExponentialBlend => "exponential-blend",
            TransitionStyle::LinearBlend => "linear-blend",
        }
    }
}

impl fmt::Display for TransitionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which end of the genre's duration range a rule asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reach {
    /// Quick-cut overlap, independent of the genre table
    Cut,
    Shortest,
    Standard,
    Longest,
}

/// Energy change across a transition, bucketed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyBand {
    Low,
    Moderate,
    High,
}

impl EnergyBand {
    pub fn classify(delta: f64, low: f64, high: f64) -> Self {
        let magnitude = delta.abs();
        if magnitude < low {
            EnergyBand::Low
        } else if magnitude > high {
            EnergyBand::High
        } else {
            EnergyBand::Moderate
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPattern {
    Any,
    Pair(SegmentKind, SegmentKind),
    /// outro -> intro, or either side unknown
    OutroIntroOrUnknown,
}

impl SegmentPattern {
    fn matches(self, out_kind: SegmentKind, in_kind: SegmentKind) -> bool {
        match self {
            SegmentPattern::Any => true,
            SegmentPattern::Pair(o, i) => o == out_kind && i == in_kind,
            SegmentPattern::OutroIntroOrUnknown => {
                (out_kind == SegmentKind::Outro && in_kind == SegmentKind::Intro)
                    || out_kind == SegmentKind::Unknown
                    || in_kind == SegmentKind::Unknown
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarmonicPattern {
    Any,
    /// Same key or relative major/minor
    TonalMatch,
    Clash,
}

impl HarmonicPattern {
    fn matches(self, relation: HarmonicRelation) -> bool {
        match self {
            HarmonicPattern::Any => true,
            HarmonicPattern::TonalMatch => relation.is_tonal_match(),
            HarmonicPattern::Clash => relation.is_clash(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyPattern {
    Any,
    Low,
    High,
}

impl EnergyPattern {
    fn matches(self, band: EnergyBand) -> bool {
        match self {
            EnergyPattern::Any => true,
            EnergyPattern::Low => band == EnergyBand::Low,
            EnergyPattern::High => band == EnergyBand::High,
        }
    }
}

/// One row of the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub name: &'static str,
    pub segments: SegmentPattern,
    pub harmonic: HarmonicPattern,
    pub energy: EnergyPattern,
    pub style: TransitionStyle,
    pub reach: Reach,
}

/// What the table is keyed on for one pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleInput {
    pub out_kind: SegmentKind,
    pub in_kind: SegmentKind,
    pub relation: HarmonicRelation,
    pub energy: EnergyBand,
}

impl Rule {
    pub fn matches(&self, input: &RuleInput) -> bool {
        self.segments.matches(input.out_kind, input.in_kind)
            && self.harmonic.matches(input.relation)
            && self.energy.matches(input.energy)
    }
}

pub const RULES: [Rule; 7] = [
    Rule {
        name: "drop-to-drop",
        segments: SegmentPattern::Pair(SegmentKind::Drop, SegmentKind::Drop),
        harmonic: HarmonicPattern::Any,
        energy: EnergyPattern::Any,
        style: TransitionStyle::QuickCut,
        reach: Reach::Cut,
    },
    Rule {
        name: "breakdown-to-buildup",
        segments: SegmentPattern::Pair(SegmentKind::Breakdown, SegmentKind::Buildup),
        harmonic: HarmonicPattern::Any,
        energy: EnergyPattern::Any,
        style: TransitionStyle::FilterSweep,
        reach: Reach::Longest,
    },
    Rule {
        name: "tonal-match-low-energy",
        segments: SegmentPattern::Any,
        harmonic: HarmonicPattern::TonalMatch,
        energy: EnergyPattern::Low,
        style: TransitionStyle::ExponentialBlend,
        reach: Reach::Longest,
    },
    Rule {
        name: "outro-to-intro",
        segments: SegmentPattern::OutroIntroOrUnknown,
        harmonic: HarmonicPattern::Any,
        energy: EnergyPattern::Any,
        style: TransitionStyle::EqSwap,
        reach: Reach::Standard,
    },
    Rule {
        name: "harmonic-clash",
        segments: SegmentPattern::Any,
        harmonic: HarmonicPattern::Clash,
        energy: EnergyPattern::Any,
        style: TransitionStyle::LinearBlend,
        reach: Reach::Shortest,
    },
    Rule {
        name: "energy-jump",
        segments: SegmentPattern::Any,
        harmonic: HarmonicPattern::Any,
        energy: EnergyPattern::High,
        style: TransitionStyle::LinearBlend,
        reach: Reach::Shortest,
    },
    Rule {
        name: "default",
        segments: SegmentPattern::Any,
        harmonic: HarmonicPattern::Any,
        energy: EnergyPattern::Any,
        style: TransitionStyle::LinearBlend,
        reach: Reach::Standard,
    },
];

/// First matching rule
pub fn select(input: &RuleInput) -> &'static Rule {
    RULES
        .iter()
        .find(|rule| rule.matches(input))
        .unwrap_or(&RULES[RULES.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(out_kind: SegmentKind, in_kind: SegmentKind, relation: HarmonicRelation, energy: EnergyBand) -> RuleInput {
        RuleInput {
            out_kind,
            in_kind,
            relation,
            energy,
        }
    }

    #[test]
    fn test_drop_to_drop_wins_over_everything() {
        let rule = select(&input(
            SegmentKind::Drop,
            SegmentKind::Drop,
            HarmonicRelation::Same,
            EnergyBand::Low,
        ));
        assert_eq!(rule.style, TransitionStyle::QuickCut);
    }

    #[test]
    fn test_breakdown_to_buildup() {
        let rule = select(&input(
            SegmentKind::Breakdown,
            SegmentKind::Buildup,
            HarmonicRelation::Same,
            EnergyBand::Low,
        ));
        assert_eq!(rule.style, TransitionStyle::FilterSweep);
        assert_eq!(rule.reach, Reach::Longest);
    }

    #[test]
    fn test_tonal_match_beats_unknown_segments() {
        let rule = select(&input(
            SegmentKind::Unknown,
            SegmentKind::Unknown,
            HarmonicRelation::Relative,
            EnergyBand::Low,
        ));
        assert_eq!(rule.style, TransitionStyle::ExponentialBlend);
    }

    #[test]
    fn test_unknown_segments_get_eq_swap() {
        let rule = select(&input(
            SegmentKind::Verse,
            SegmentKind::Unknown,
            HarmonicRelation::Unknown,
            EnergyBand::Moderate,
        ));
        assert_eq!(rule.style, TransitionStyle::EqSwap);
    }

    #[test]
    fn test_clash_and_energy_jump_are_short() {
        let clash = select(&input(
            SegmentKind::Verse,
            SegmentKind::Verse,
            HarmonicRelation::Clash { distance: 4 },
            EnergyBand::Low,
        ));
        assert_eq!((clash.style, clash.reach), (TransitionStyle::LinearBlend, Reach::Shortest));

        let jump = select(&input(
            SegmentKind::Verse,
            SegmentKind::Verse,
            HarmonicRelation::Same,
            EnergyBand::High,
        ));
        assert_eq!(jump.name, "energy-jump");
    }

    #[test]
    fn test_default_row() {
        let rule = select(&input(
            SegmentKind::Verse,
            SegmentKind::Drop,
            HarmonicRelation::Adjacent,
            EnergyBand::Moderate,
        ));
        assert_eq!(rule.name, "default");
        assert_eq!(rule.reach, Reach::Standard);
    }

    #[test]
    fn test_energy_bands() {
        assert_eq!(EnergyBand::classify(0.05, 0.1, 0.3), EnergyBand::Low);
        assert_eq!(EnergyBand::classify(-0.2, 0.1, 0.3), EnergyBand::Moderate);
        assert_eq!(EnergyBand::classify(-0.5, 0.1, 0.3), EnergyBand::High);
    }

    #[test]
    fn test_style_names_are_kebab_case() {
        let json = serde_json::to_string(&TransitionStyle::ExponentialBlend).unwrap();
        assert_eq!(json, "\"exponential-blend\"");
    }
}
