//! Harmonic ordering: compatibility scoring and set sequencing

pub mod compatibility;
pub mod energy_curve;
pub mod orderer;

pub use compatibility::{pair_compatibility, PairCompatibility};
pub use energy_curve::EnergyCurve;
pub use orderer::{HarmonicOrderer, OrderResult};
