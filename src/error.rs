//! Unified error types for djmix
//!
//! Error strategy:
//! - Per-track errors (decode, analysis): Recoverable, skip the track in
//!   directory mode, abort an explicit request
//! - Render errors (encoder, timeout, cancellation): Fatal to the session
//! - System errors (output, config): Fatal, abort the run
//!
//! Degradations that are absorbed locally (analysis fallback, crossfade
//! shrinking, rejected time-stretch) are not errors at all; they are logged
//! and recorded in the transition rationale.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Supported audio formats for helpful error messages
pub const SUPPORTED_FORMATS: &str = "MP3, WAV, FLAC, AIFF";

/// Top-level error type for djmix operations
#[derive(Debug, Error)]
pub enum MixError {
    // =========================================================================
    // Recoverable errors - skip track, continue batch
    // =========================================================================
    #[error("Failed to decode audio file '{path}': {reason}\n  Supported formats: {SUPPORTED_FORMATS}\n  Tip: If the file plays in other apps, it may be corrupted or use an unsupported codec")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Unsupported audio format for '{path}': {format}\n  Supported formats: {SUPPORTED_FORMATS}")]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("Analysis failed for '{path}': {reason}")]
    AnalysisError { path: PathBuf, reason: String },

    #[error("File not found: '{0}'\n  Tip: Check the path exists and is accessible")]
    FileNotFound(PathBuf),

    // =========================================================================
    // Session errors - fatal to one mix session
    // =========================================================================
    #[error("Render step {step} failed: {reason}")]
    RenderStep { step: usize, reason: String },

    #[error("Encoder '{program}' could not be started: {reason}\n  Tip: Install ffmpeg or pass --ffmpeg /path/to/ffmpeg")]
    EncoderUnavailable { program: String, reason: String },

    #[error("Encoder job '{job}' failed: {reason}")]
    EncoderFailed { job: String, reason: String },

    #[error("Encoder timed out after {0:?}")]
    EncoderTimeout(Duration),

    #[error("Mix session exceeded its time budget of {0:?}")]
    SessionTimeout(Duration),

    #[error("Mix session was cancelled")]
    Cancelled,

    #[error("Mix session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid mix request: {0}")]
    InvalidRequest(String),

    // =========================================================================
    // Fatal errors - abort entire run
    // =========================================================================
    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    OutputError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for djmix operations
pub type Result<T> = std::result::Result<T, MixError>;

impl MixError {
    /// Returns true if this error is recoverable (should skip track, continue batch)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MixError::DecodeError { .. }
                | MixError::UnsupportedFormat { .. }
                | MixError::AnalysisError { .. }
                | MixError::FileNotFound(_)
        )
    }

    /// Returns true if a render step hitting this error deserves a simplified retry
    pub fn is_retryable_step(&self) -> bool {
        matches!(
            self,
            MixError::RenderStep { .. }
                | MixError::EncoderFailed { .. }
                | MixError::EncoderTimeout(_)
        )
    }

    /// Create a decode error with context about the issue
    pub fn decode_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        MixError::DecodeError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied. Check that you have write access to {}", path.display())
            }
            std::io::ErrorKind::NotFound => {
                format!("Directory does not exist: {}", path.parent().map(|p| p.display().to_string()).unwrap_or_default())
            }
            _ => err.to_string(),
        };
        MixError::OutputError { path, reason }
    }
}

/// Extension trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error about which file was being processed
    fn with_file_context(self, path: &std::path::Path) -> Result<T>;
}

impl<T, E: std::fmt::Display> ErrorContext<T> for std::result::Result<T, E> {
    fn with_file_context(self, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| MixError::AnalysisError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
