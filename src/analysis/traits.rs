//! Analysis trait abstractions
//!
//! Tempo and key estimation sit behind a trait so the structural analyzer
//! can be driven by stratum-dsp in production and by fixed values in tests.

use crate::analysis::key::CamelotKey;
use crate::error::Result;
use crate::types::AudioBuffer;

/// Raw output of a tempo/key estimator, before confidence gating
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoKeyEstimate {
    /// Estimated tempo; `None` when nothing plausible was found
    pub bpm: Option<f64>,
    /// Estimator confidence for the tempo (0.0 - 1.0)
    pub bpm_confidence: f64,
    pub key: Option<CamelotKey>,
    /// Estimator confidence for the key (0.0 - 1.0)
    pub key_confidence: f64,
}

impl TempoKeyEstimate {
    /// An estimate carrying no information
    pub fn empty() -> Self {
        Self {
            bpm: None,
            bpm_confidence: 0.0,
            key: None,
            key_confidence: 0.0,
        }
    }
}

/// Tempo and key estimation backend
pub trait TempoKeyEstimator: Send + Sync {
    /// Estimate tempo and key from mono samples
    fn estimate(&self, buffer: &AudioBuffer) -> Result<TempoKeyEstimate>;

    /// Get the name of this estimator (for logging)
    fn name(&self) -> &'static str;
}
