//! Concurrent session bookkeeping
//!
//! Sessions run as tokio tasks, at most `worker_count` rendering at once.
//! Status reads only touch the watch snapshot. Finished sessions are kept
//! for the retention period so their status can still be queried.

use crate::error::{MixError, Result};
use crate::session::status::{MixOutput, ProgressTracker, SessionStatus};
use crate::session::MixEngine;
use crate::types::MixRequest;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

struct SessionEntry {
    status: watch::Receiver<SessionStatus>,
    cancel: CancellationToken,
    task: JoinHandle<Result<MixOutput>>,
}

pub struct SessionManager {
    engine: MixEngine,
    permits: Arc<Semaphore>,
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
}

impl SessionManager {
    pub fn new(engine: MixEngine) -> Self {
        let workers = engine.config().session.worker_count();
        debug!("Session manager with {} render slots", workers);
        Self {
            engine,
            permits: Arc::new(Semaphore::new(workers)),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &MixEngine {
        &self.engine
    }

    /// Start a session; it waits for a free render slot before analysis
    pub fn submit(&self, request: MixRequest, destination: PathBuf) -> Uuid {
        let id = Uuid::new_v4();
        let (tracker, status) = ProgressTracker::new(id);
        let cancel = CancellationToken::new();

        let engine = self.engine.clone();
        let permits = Arc::clone(&self.permits);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let permit = tokio::select! {
                permit = permits.acquire_owned() => permit,
                _ = token.cancelled() => {
                    tracker.fail(MixError::Cancelled.to_string());
                    return Err(MixError::Cancelled);
                }
            };
            let _permit = match permit {
                Ok(permit) => permit,
                Err(_) => {
                    tracker.fail(MixError::Cancelled.to_string());
                    return Err(MixError::Cancelled);
                }
            };
            engine.run(request, destination, &tracker, token).await
        });

        info!("Submitted session {}", id);
        self.sessions.lock().insert(
            id,
            SessionEntry {
                status,
                cancel,
                task,
            },
        );
        id
    }

    /// Latest status snapshot; never waits on rendering
    pub fn status(&self, id: Uuid) -> Result<SessionStatus> {
        self.sessions
            .lock()
            .get(&id)
            .map(|entry| entry.status.borrow().clone())
            .ok_or_else(|| MixError::SessionNotFound(id.to_string()))
    }

    /// Request cancellation; the session fails with `Cancelled` shortly after
    pub fn cancel(&self, id: Uuid) -> Result<()> {
        let sessions = self.sessions.lock();
        let entry = sessions
            .get(&id)
            .ok_or_else(|| MixError::SessionNotFound(id.to_string()))?;
        info!("Cancelling session {}", id);
        entry.cancel.cancel();
        Ok(())
    }

    /// Wait until the session reaches a terminal state
    pub async fn wait(&self, id: Uuid) -> Result<SessionStatus> {
        let mut status = self
            .sessions
            .lock()
            .get(&id)
            .map(|entry| entry.status.clone())
            .ok_or_else(|| MixError::SessionNotFound(id.to_string()))?;

        // A dropped sender leaves the last value, which is as final as it gets
        if status.wait_for(|s| s.state.is_terminal()).await.is_err() {
            debug!("Session {} ended without a terminal status", id);
        }
        let snapshot = status.borrow().clone();
        Ok(snapshot)
    }

    /// Wait for the session's result and forget the session
    pub async fn take_result(&self, id: Uuid) -> Result<MixOutput> {
        let entry = self
            .sessions
            .lock()
            .remove(&id)
            .ok_or_else(|| MixError::SessionNotFound(id.to_string()))?;
        entry
            .task
            .await
            .map_err(|e| MixError::Io(std::io::Error::other(e)))?
    }

    /// Forget finished sessions older than the retention period
    pub fn reap_expired(&self) -> usize {
        let retention = self.engine.config().session.retention();
        let now = chrono::Utc::now();
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| {
            let status = entry.status.borrow();
            let age = (now - status.updated_at).to_std().unwrap_or_default();
            !(status.state.is_terminal() && age >= retention)
        });
        let reaped = before - sessions.len();
        if reaped > 0 {
            debug!("Reaped {} finished sessions", reaped);
        }
        reaped
    }

    /// Sessions currently known, finished or not
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
