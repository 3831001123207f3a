//! Key notation and harmonic relationships

pub mod camelot;

pub use camelot::{to_camelot, CamelotKey, HarmonicRelation};
