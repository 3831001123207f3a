//! Run orchestration for the CLI

pub mod orchestrator;

pub use orchestrator::{build_request, run, PipelineResult};
