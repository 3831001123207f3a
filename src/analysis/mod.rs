//! Structural analysis of source tracks
//!
//! Tempo and key estimation is a swappable backend (stratum-dsp in
//! production); beat grid, energy envelope and segment timeline are computed
//! here from the decoded audio.

pub mod beatgrid;
pub mod cache;
pub mod key;
pub mod metadata;
pub mod onset;
pub mod segments;
pub mod stratum;
pub mod structure;
pub mod traits;

pub use cache::{ProfileCache, DEFAULT_CACHE_CAPACITY};
pub use key::{CamelotKey, HarmonicRelation};
pub use segments::is_contiguous_cover;
pub use stratum::StratumEstimator;
pub use structure::StructuralAnalyzer;
pub use traits::{TempoKeyEstimate, TempoKeyEstimator};
