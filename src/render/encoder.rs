//! External encoder seam
//!
//! The renderer only ever hands the encoder an argument list and an output
//! path. `FfmpegEncoder` runs the real `ffmpeg` binary as an async child
//! process; tests substitute in-process encoders that write the output file
//! themselves.

use crate::error::{MixError, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lines of encoder stderr kept for error messages
const STDERR_TAIL_LINES: usize = 6;

/// What an encoder invocation produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// One fold step; `attempt` is 0 for the planned transition and 1 for
    /// the simplified retry
    Transition { step: usize, attempt: u32 },
    /// Loudness-normalized final encode
    Master,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Transition { step, attempt: 0 } => write!(f, "transition {}", step),
            JobKind::Transition { step, attempt } => {
                write!(f, "transition {} (retry {})", step, attempt)
            }
            JobKind::Master => f.write_str("master"),
        }
    }
}

/// One encoder invocation
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub kind: JobKind,
    /// Encoder arguments, without the output path
    pub args: Vec<String>,
    pub output: PathBuf,
}

/// Something that can execute an [`EncodeJob`]
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    /// Run `job` to completion. Must return [`MixError::Cancelled`] promptly
    /// once `cancel` fires and [`MixError::EncoderTimeout`] after `timeout`.
    async fn run(&self, job: &EncodeJob, timeout: Duration, cancel: &CancellationToken) -> Result<()>;

    /// Encoder name for logging
    fn name(&self) -> &str;
}

/// Runs jobs through the `ffmpeg` command-line tool
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Check that the binary can be started at all
    pub async fn check_available(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(self.unavailable(format!("'-version' exited with {}", status)))
        }
    }

    fn unavailable(&self, reason: String) -> MixError {
        MixError::EncoderUnavailable {
            program: self.program.display().to_string(),
            reason,
        }
    }
}

#[async_trait]
impl AudioEncoder for FfmpegEncoder {
    async fn run(&self, job: &EncodeJob, timeout: Duration, cancel: &CancellationToken) -> Result<()> {
        debug!("{} {}: {}", self.name(), job.kind, job.args.join(" "));

        let child = Command::new(&self.program)
            .args(["-hide_banner", "-nostdin", "-y", "-loglevel", "error"])
            .args(&job.args)
            .arg(&job.output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.unavailable(e.to_string()))?;

        // Dropping the wait future drops the child, which kills it
        let output = tokio::select! {
            waited = tokio::time::timeout(timeout, child.wait_with_output()) => match waited {
                Ok(output) => output?,
                Err(_) => return Err(MixError::EncoderTimeout(timeout)),
            },
            _ = cancel.cancelled() => return Err(MixError::Cancelled),
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(MixError::EncoderFailed {
                job: job.kind.to_string(),
                reason: format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    stderr_tail(&output.stderr)
                ),
            })
        }
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Last few non-empty lines of a process's stderr
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.is_empty() {
        return "no diagnostic output".to_string();
    }
    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join(" | ")
}
