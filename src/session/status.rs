//! Session status snapshots
//!
//! A session publishes its status through a `watch` channel; readers take a
//! snapshot without ever waiting on the render.

use crate::planner::TransitionPlan;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Pending,
    Rendering,
    Complete,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Complete | SessionState::Failed)
    }
}

/// Result of a completed session
#[derive(Debug, Clone, Serialize)]
pub struct MixOutput {
    pub path: PathBuf,
    pub total_duration_seconds: f64,
    pub transition_count: usize,
    /// Transitions as rendered, including simplified retries
    pub transitions: Vec<TransitionPlan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub id: Uuid,
    pub state: SessionState,
    /// 0-100, never decreases
    pub progress_percent: f64,
    pub progress_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_transition: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<MixOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SessionStatus {
    pub fn pending(id: Uuid) -> Self {
        Self {
            id,
            state: SessionState::Pending,
            progress_percent: 0.0,
            progress_message: "queued".to_string(),
            current_transition: None,
            output: None,
            error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Write side of a session's status channel
#[derive(Debug)]
pub struct ProgressTracker {
    tx: watch::Sender<SessionStatus>,
}

impl ProgressTracker {
    pub fn new(id: Uuid) -> (Self, watch::Receiver<SessionStatus>) {
        let (tx, rx) = watch::channel(SessionStatus::pending(id));
        (Self { tx }, rx)
    }

    pub fn id(&self) -> Uuid {
        self.tx.borrow().id
    }

    pub fn snapshot(&self) -> SessionStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.tx.subscribe()
    }

    /// Report progress; a percent lower than the last one is ignored
    pub fn update(&self, percent: f64, message: impl Into<String>, transition: Option<usize>) {
        let message = message.into();
        self.tx.send_modify(|status| {
            if status.state.is_terminal() {
                return;
            }
            status.state = SessionState::Rendering;
            status.progress_percent = status.progress_percent.max(percent.clamp(0.0, 100.0));
            status.progress_message = message;
            status.current_transition = transition;
            status.updated_at = Utc::now();
        });
    }

    pub fn complete(&self, output: MixOutput) {
        self.tx.send_modify(|status| {
            status.state = SessionState::Complete;
            status.progress_percent = 100.0;
            status.progress_message = format!("wrote {}", output.path.display());
            status.current_transition = None;
            status.output = Some(output);
            status.updated_at = Utc::now();
        });
    }

    pub fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        self.tx.send_modify(|status| {
            status.state = SessionState::Failed;
            status.progress_message = "failed".to_string();
            status.error = Some(error);
            status.updated_at = Utc::now();
        });
    }
}
