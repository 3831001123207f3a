//! Target energy shapes for a set
//!
//! A curve maps a normalized position in the set (0.0 = first transition,
//! 1.0 = last) to a target energy, scaled into the energy range of the
//! tracks being ordered so a mellow set is not pushed towards 1.0.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyCurve {
    /// Hold energy steady
    Flat,
    /// Warm up steadily to the end
    Rising,
    /// Start high, wind down
    Falling,
    /// Build to a single peak in the middle, then release
    Peak,
    /// Two build/release cycles
    Wave,
}

impl EnergyCurve {
    /// Target energy at `position` (0.0 - 1.0) within `[low, high]`
    pub fn target(self, position: f64, low: f64, high: f64) -> f64 {
        let p = position.clamp(0.0, 1.0);
        let shape = match self {
            EnergyCurve::Flat => 0.5,
            EnergyCurve::Rising => p,
            EnergyCurve::Falling => 1.0 - p,
            EnergyCurve::Peak => 1.0 - (2.0 * p - 1.0).abs(),
            EnergyCurve::Wave => 0.5 - 0.5 * (4.0 * std::f64::consts::PI * p).cos(),
        };
        low + (high - low) * shape
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnergyCurve::Flat => "flat",
            EnergyCurve::Rising => "rising",
            EnergyCurve::Falling => "falling",
            EnergyCurve::Peak => "peak",
            EnergyCurve::Wave => "wave",
        }
    }
}

impl fmt::Display for EnergyCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnergyCurve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flat" => Ok(EnergyCurve::Flat),
            "rising" | "up" => Ok(EnergyCurve::Rising),
            "falling" | "down" => Ok(EnergyCurve::Falling),
            "peak" => Ok(EnergyCurve::Peak),
            "wave" => Ok(EnergyCurve::Wave),
            other => Err(format!(
                "unknown energy curve '{}' (expected flat, rising, falling, peak or wave)",
                other
            )),
        }
    }
}

/// Normalized position of transition `index` among `count` transitions
pub fn transition_position(index: usize, count: usize) -> f64 {
    if count <= 1 {
        0.5
    } else {
        index as f64 / (count - 1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes() {
        assert_eq!(EnergyCurve::Rising.target(0.0, 0.2, 0.8), 0.2);
        assert_eq!(EnergyCurve::Rising.target(1.0, 0.2, 0.8), 0.8);
        assert_eq!(EnergyCurve::Falling.target(1.0, 0.2, 0.8), 0.2);
        assert!((EnergyCurve::Peak.target(0.5, 0.0, 1.0) - 1.0).abs() < 1e-12);
        assert!(EnergyCurve::Wave.target(0.0, 0.0, 1.0).abs() < 1e-12);
        assert!((EnergyCurve::Wave.target(0.25, 0.0, 1.0) - 1.0).abs() < 1e-12);
        assert_eq!(EnergyCurve::Flat.target(0.9, 0.4, 0.6), 0.5);
    }

    #[test]
    fn test_parse_round_trip_names() {
        for curve in [
            EnergyCurve::Flat,
            EnergyCurve::Rising,
            EnergyCurve::Falling,
            EnergyCurve::Peak,
            EnergyCurve::Wave,
        ] {
            assert_eq!(curve.as_str().parse::<EnergyCurve>().unwrap(), curve);
        }
        assert!("zigzag".parse::<EnergyCurve>().is_err());
    }

    #[test]
    fn test_transition_position() {
        assert_eq!(transition_position(0, 1), 0.5);
        assert_eq!(transition_position(0, 3), 0.0);
        assert_eq!(transition_position(2, 3), 1.0);
    }
}
