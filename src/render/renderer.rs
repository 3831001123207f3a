//! Left-fold mix renderer
//!
//! Track 0 is the first intermediate. Step k blends the running
//! intermediate with track k+1 into a new intermediate, which then replaces
//! the old one on disk. A final pass normalizes loudness, encodes the
//! master inside the session workspace and moves it into place.

use crate::config::RenderConfig;
use crate::error::{MixError, Result};
use crate::planner::{MixPlan, TransitionPlan};
use crate::render::encoder::{AudioEncoder, EncodeJob, JobKind};
use crate::render::filtergraph::{master_args, step_args, StepCuts};
use crate::session::status::ProgressTracker;
use crate::session::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Share of progress reserved for the master encode
const MASTER_SHARE: f64 = 10.0;

/// What the renderer actually produced
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub path: PathBuf,
    pub total_duration_seconds: f64,
    /// Plans as rendered; a retried step carries its simplified plan
    pub transitions: Vec<TransitionPlan>,
}

pub struct MixRenderer {
    encoder: Arc<dyn AudioEncoder>,
    config: RenderConfig,
    min_bars: u32,
}

impl MixRenderer {
    pub fn new(encoder: Arc<dyn AudioEncoder>, config: RenderConfig, min_bars: u32) -> Self {
        Self {
            encoder,
            config,
            min_bars,
        }
    }

    /// Render `plan` into `destination`
    pub async fn render(
        &self,
        plan: &MixPlan,
        workspace: &Workspace,
        destination: &Path,
        progress: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<RenderOutcome> {
        let first = plan
            .entries
            .first()
            .ok_or_else(|| MixError::InvalidRequest("mix has no tracks".to_string()))?;

        let steps = plan.transitions.len();
        let step_share = (100.0 - MASTER_SHARE) / steps.max(1) as f64;
        let mut current = first.source.clone();
        let mut owned: Option<PathBuf> = None;
        // Intermediate time at which the outgoing track's time zero sits
        let mut head = 0.0;
        let mut rendered = Vec::with_capacity(steps);

        for (k, transition) in plan.transitions.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(MixError::Cancelled);
            }
            let incoming = plan.entries.get(k + 1).ok_or_else(|| {
                MixError::InvalidRequest(format!("transition {} has no incoming track", k))
            })?;
            progress.update(
                k as f64 * step_share,
                format!(
                    "transition {}/{}: {} -> {} ({})",
                    k + 1,
                    steps,
                    transition.from_title,
                    transition.to_title,
                    transition.style
                ),
                Some(k),
            );

            let output = workspace.intermediate(k);
            let used = self
                .render_step(k, transition, &current, head, &incoming.source, &output, cancel)
                .await?;

            // The consumed intermediate is no longer needed
            if let Some(previous) = owned.take() {
                remove_quietly(&previous).await;
            }
            head += used.mix_out_point + used.duration_seconds - used.mix_in_point;
            current = output.clone();
            owned = Some(output);
            rendered.push(used);
        }

        if cancel.is_cancelled() {
            return Err(MixError::Cancelled);
        }
        progress.update(100.0 - MASTER_SHARE, "mastering", None);
        let master = workspace.master();
        let job = EncodeJob {
            kind: JobKind::Master,
            args: master_args(&current, &self.config),
            output: master.clone(),
        };
        self.encoder
            .run(&job, self.config.step_timeout(), cancel)
            .await?;
        if let Some(previous) = owned.take() {
            remove_quietly(&previous).await;
        }

        move_into_place(&master, destination).await?;

        let last_duration = plan.entries.last().map(|e| e.profile.duration).unwrap_or(0.0);
        let total_duration_seconds = head + last_duration;
        info!(
            "Rendered {} transitions, {:.1}s, to {}",
            rendered.len(),
            total_duration_seconds,
            destination.display()
        );

        Ok(RenderOutcome {
            path: destination.to_path_buf(),
            total_duration_seconds,
            transitions: rendered,
        })
    }

    /// Run one step, retrying once with the simplified plan
    #[allow(clippy::too_many_arguments)]
    async fn render_step(
        &self,
        step: usize,
        transition: &TransitionPlan,
        intermediate: &Path,
        head: f64,
        incoming: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<TransitionPlan> {
        let first = self
            .run_step(step, 0, transition, intermediate, head, incoming, output, cancel)
            .await;
        let err = match first {
            Ok(()) => return Ok(transition.clone()),
            Err(e) if e.is_retryable_step() => e,
            Err(e) => return Err(e),
        };

        warn!(
            "Transition {} failed ({}); retrying as a simplified blend",
            step, err
        );
        remove_quietly(output).await;
        let simplified = transition.simplified(self.min_bars);
        match self
            .run_step(step, 1, &simplified, intermediate, head, incoming, output, cancel)
            .await
        {
            Ok(()) => Ok(simplified),
            Err(MixError::Cancelled) => Err(MixError::Cancelled),
            Err(retry) => Err(MixError::RenderStep {
                step,
                reason: format!("{}; simplified retry also failed: {}", err, retry),
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_step(
        &self,
        step: usize,
        attempt: u32,
        transition: &TransitionPlan,
        intermediate: &Path,
        head: f64,
        incoming: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let cuts = StepCuts::for_plan(transition, head);
        debug!(
            "Step {} attempt {}: body to {:.3}s, overlap {:.3}s, cue-in {:.3}s",
            step, attempt, cuts.body_end, cuts.overlap, cuts.mix_in
        );
        let job = EncodeJob {
            kind: JobKind::Transition { step, attempt },
            args: step_args(intermediate, incoming, &cuts, transition.style, &self.config),
            output: output.to_path_buf(),
        };
        self.encoder
            .run(&job, self.config.step_timeout(), cancel)
            .await
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}

/// Move the finished master to `destination` atomically
///
/// A plain rename when both sides share a filesystem; otherwise copy next to
/// the destination and rename there, so a partial file is never visible.
pub async fn move_into_place(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| MixError::output_error(destination, e))?;
    }

    if tokio::fs::rename(source, destination).await.is_ok() {
        return Ok(());
    }
    copy_into_place(source, destination).await?;
    remove_quietly(source).await;
    Ok(())
}

/// Copy through a hidden staging file in the destination directory
///
/// The staging file is deleted when dropped, so an error, a timeout or a
/// cancelled session mid-copy leaves nothing behind.
async fn copy_into_place(source: &Path, destination: &Path) -> Result<()> {
    let parent = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "mix".to_string());

    let staging = tempfile::Builder::new()
        .prefix(&format!(".{}.", name))
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(|e| MixError::output_error(destination, e))?;
    // Write through the staging file's own handle; its name is never reopened
    let mut reader = tokio::fs::File::open(source)
        .await
        .map_err(|e| MixError::output_error(destination, e))?;
    let handle = staging
        .reopen()
        .map_err(|e| MixError::output_error(destination, e))?;
    let mut writer = tokio::fs::File::from_std(handle);
    tokio::io::copy(&mut reader, &mut writer)
        .await
        .map_err(|e| MixError::output_error(destination, e))?;
    writer
        .sync_all()
        .await
        .map_err(|e| MixError::output_error(destination, e))?;
    drop(writer);

    staging
        .persist(destination)
        .map_err(|e| MixError::output_error(destination, e.error))?;
    Ok(())
}
