use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::{Result, ThumbviewError};

const WORKSPACE_PREFIX: &str = "thumbview.";

/// Temporary directory holding the generated thumbnails of the current folder.
///
/// Exactly one directory is live at a time. It is replaced on every folder
/// change and removed when the workspace is dropped, so thumbnails never
/// outlive the process. The random suffix keeps concurrent viewers apart.
pub struct Workspace {
    base: PathBuf,
    dir: Option<TempDir>,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        Self::in_dir(std::env::temp_dir())
    }

    pub fn in_dir(base: impl Into<PathBuf>) -> Result<Self> {
        let mut workspace = Self {
            base: base.into(),
            dir: None,
        };
        workspace.recreate()?;
        Ok(workspace)
    }

    /// Deletes the current directory (if any) and creates a fresh one.
    pub fn recreate(&mut self) -> Result<&Path> {
        // Old thumbnails must be gone before the new batch starts writing
        self.purge()?;
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(&self.base)
            .map_err(ThumbviewError::WorkspaceCreation)?;
        log::debug!("Thumbnail workspace: {}", dir.path().display());
        Ok(self.dir.insert(dir).path())
    }

    /// Removes the current directory and everything in it.
    pub fn purge(&mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            // close() reports the error that TempDir's own drop would swallow
            let path = dir.path().to_path_buf();
            dir.close().map_err(ThumbviewError::WorkspaceRemoval)?;
            log::debug!("Removed thumbnail workspace {}", path.display());
        }
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(|dir| dir.path())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.purge() {
            log::warn!("{}", e);
        }
    }
}
