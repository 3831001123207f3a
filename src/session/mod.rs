//! Mix sessions
//!
//! A session takes one request from analysis through ordering and planning
//! to a rendered master. Everything it writes lives in its own workspace,
//! which is gone by the time the session reports `complete` or `failed`.

pub mod manager;
pub mod status;
pub mod workspace;

pub use manager::SessionManager;
pub use status::{MixOutput, ProgressTracker, SessionState, SessionStatus};
pub use workspace::Workspace;

use crate::analysis::{ProfileCache, StructuralAnalyzer};
use crate::config::MixConfig;
use crate::error::{MixError, Result};
use crate::ordering::{HarmonicOrderer, OrderResult};
use crate::planner::{MixPlan, TransitionPlanner};
use crate::render::{AudioEncoder, MixRenderer};
use crate::types::{MixRequest, TrackProfile};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

/// A planned but not yet rendered mix
#[derive(Debug, Clone)]
pub struct PreparedMix {
    pub plan: MixPlan,
    /// Present when the request asked for harmonic ordering
    pub ordering: Option<OrderResult>,
}

/// Shared resources every session draws on. Cheap to clone.
#[derive(Clone)]
pub struct MixEngine {
    config: Arc<MixConfig>,
    analyzer: Arc<StructuralAnalyzer>,
    cache: Arc<ProfileCache>,
    encoder: Arc<dyn AudioEncoder>,
}

impl MixEngine {
    /// Engine with the default stratum-dsp estimator
    pub fn new(config: MixConfig, encoder: Arc<dyn AudioEncoder>) -> Self {
        let analyzer = Arc::new(StructuralAnalyzer::with_stratum(config.analysis.clone()));
        Self::with_analyzer(config, analyzer, encoder)
    }

    pub fn with_analyzer(
        config: MixConfig,
        analyzer: Arc<StructuralAnalyzer>,
        encoder: Arc<dyn AudioEncoder>,
    ) -> Self {
        let cache = Arc::new(ProfileCache::with_capacity(config.analysis.cache_capacity));
        Self {
            config: Arc::new(config),
            analyzer,
            cache,
            encoder,
        }
    }

    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    pub fn cache(&self) -> &ProfileCache {
        &self.cache
    }

    /// Analyze, order and plan without rendering
    pub async fn prepare(&self, request: &MixRequest) -> Result<PreparedMix> {
        if request.tracks.is_empty() {
            return Err(MixError::InvalidRequest("request contains no tracks".to_string()));
        }

        let results = Arc::clone(&self.cache)
            .resolve_all_blocking(Arc::clone(&self.analyzer), request.tracks.clone())
            .await?;

        let mut profiles: Vec<Arc<TrackProfile>> = Vec::with_capacity(results.len());
        for (input, result) in request.tracks.iter().zip(results) {
            match result {
                Ok(profile) => profiles.push(profile),
                Err(e) if request.skip_unreadable && e.is_recoverable() => {
                    warn!("Skipping {}: {}", input.source.display(), e);
                }
                Err(e) => return Err(e),
            }
        }
        if profiles.is_empty() {
            return Err(MixError::InvalidRequest("no readable tracks in request".to_string()));
        }

        let ordering = if request.order && profiles.len() > 1 {
            let orderer = HarmonicOrderer::new(self.config.ordering.clone());
            let result = orderer.order(&profiles, request.energy_curve, request.seed);
            profiles = result
                .permutation
                .iter()
                .map(|&i| Arc::clone(&profiles[i]))
                .collect();
            info!("Ordered {} tracks, total score {:.1}", profiles.len(), result.total_score);
            Some(result)
        } else {
            None
        };

        let plan = TransitionPlanner::from_config(&self.config).plan_mix(&profiles);
        Ok(PreparedMix { plan, ordering })
    }

    /// Run a whole session and publish its outcome on `tracker`
    ///
    /// Bounded by the session time budget and by `cancel`; the workspace is
    /// removed before this returns.
    pub async fn run(
        &self,
        request: MixRequest,
        destination: PathBuf,
        tracker: &ProgressTracker,
        cancel: CancellationToken,
    ) -> Result<MixOutput> {
        let budget = self.config.session.session_timeout(request.tracks.len());
        let work = async {
            info!("Session started: {} tracks -> {}", request.tracks.len(), destination.display());
            tracker.update(1.0, "analyzing tracks", None);
            let prepared = self.prepare(&request).await?;
            self.render_plan(&prepared.plan, &destination, tracker, &cancel).await
        };
        self.supervise(work, budget, tracker, &cancel).await
    }

    /// Render an already prepared mix under the same budget and cancellation
    /// rules as [`run`](Self::run)
    pub async fn render(
        &self,
        prepared: &PreparedMix,
        destination: &Path,
        tracker: &ProgressTracker,
        cancel: CancellationToken,
    ) -> Result<MixOutput> {
        let budget = self.config.session.session_timeout(prepared.plan.entries.len());
        let work = self.render_plan(&prepared.plan, destination, tracker, &cancel);
        self.supervise(work, budget, tracker, &cancel).await
    }

    async fn supervise<F>(
        &self,
        work: F,
        budget: Duration,
        tracker: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<MixOutput>
    where
        F: Future<Output = Result<MixOutput>>,
    {
        let id = tracker.id();
        let result = async {
            tokio::select! {
                done = tokio::time::timeout(budget, work) => {
                    done.unwrap_or(Err(MixError::SessionTimeout(budget)))
                }
                _ = cancel.cancelled() => Err(MixError::Cancelled),
            }
        }
        .instrument(info_span!("session", id = %id))
        .await;

        match &result {
            Ok(output) => {
                info!(session = %id, "Session complete: {}", output.path.display());
                tracker.complete(output.clone());
            }
            Err(e) => {
                error!(session = %id, "Session failed: {}", e);
                tracker.fail(e.to_string());
            }
        }
        result
    }

    async fn render_plan(
        &self,
        plan: &MixPlan,
        destination: &Path,
        tracker: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<MixOutput> {
        if cancel.is_cancelled() {
            return Err(MixError::Cancelled);
        }

        let workspace = Workspace::create(tracker.id(), self.config.session.work_dir.as_deref())?;
        let renderer = MixRenderer::new(
            Arc::clone(&self.encoder),
            self.config.render.clone(),
            self.config.planner.min_bars,
        );
        let rendered = renderer
            .render(plan, &workspace, destination, tracker, cancel)
            .await;
        workspace.close();
        let outcome = rendered?;

        Ok(MixOutput {
            path: outcome.path,
            total_duration_seconds: outcome.total_duration_seconds,
            transition_count: outcome.transitions.len(),
            transitions: outcome.transitions,
        })
    }
}
