//! Audio decoding for analysis

pub mod decoder;

pub use decoder::{decode, ANALYSIS_SAMPLE_RATE};
