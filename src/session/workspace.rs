//! Per-session scratch directory
//!
//! All intermediates and the unmoved master live here. The directory is
//! removed when the workspace is closed or dropped, whatever the outcome.

use crate::error::{MixError, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create `djmix-<id>-XXXX` under `base`, or the system temp dir
    pub fn create(id: Uuid, base: Option<&Path>) -> Result<Self> {
        let prefix = format!("djmix-{}-", id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match base {
            Some(base) => {
                std::fs::create_dir_all(base).map_err(|e| MixError::output_error(base, e))?;
                builder.tempdir_in(base)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| MixError::output_error(std::env::temp_dir(), e))?;

        debug!("Session workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Output of fold step `step`
    pub fn intermediate(&self, step: usize) -> PathBuf {
        self.dir.path().join(format!("step-{:03}.wav", step))
    }

    /// Master before it is moved to its destination
    pub fn master(&self) -> PathBuf {
        self.dir.path().join("master.mp3")
    }

    /// Remove the directory now, logging rather than failing on error
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Could not remove session workspace {}: {}", path.display(), e);
        }
    }
}
