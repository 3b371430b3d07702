//! Directory resource.
use anyhow::{Context as _, Result};
use std::path::PathBuf;

use super::fs::{mode_of, set_mode};
use super::{Applicable, Resource, ResourceChange, ResourceState};

/// A directory with the given permission bits.
///
/// A symlink to a directory satisfies the resource as-is; its target's
/// permissions are never changed.
#[derive(Debug, Clone)]
pub struct DirResource {
    /// Absolute target path.
    pub target: PathBuf,
    /// Desired permission bits.
    pub mode: u32,
}

impl DirResource {
    /// Create a new directory resource.
    #[must_use]
    pub const fn new(target: PathBuf, mode: u32) -> Self {
        Self { target, mode }
    }
}

impl Applicable for DirResource {
    fn description(&self) -> String {
        format!("{}/ ({:o})", self.target.display(), self.mode)
    }

    fn apply(&self) -> Result<ResourceChange> {
        if self
            .target
            .symlink_metadata()
            .is_ok_and(|m| m.file_type().is_symlink())
            && self.target.is_dir()
        {
            return Ok(ResourceChange::AlreadyCorrect);
        }
        if !self.target.is_dir() {
            std::fs::create_dir_all(&self.target)
                .with_context(|| format!("create directory: {}", self.target.display()))?;
        }
        set_mode(&self.target, self.mode)?;
        Ok(ResourceChange::Applied)
    }
}

impl Resource for DirResource {
    fn current_state(&self) -> Result<ResourceState> {
        let Ok(meta) = self.target.symlink_metadata() else {
            return Ok(ResourceState::Missing);
        };
        if meta.file_type().is_symlink() {
            return Ok(if self.target.is_dir() {
                ResourceState::Correct
            } else {
                ResourceState::Invalid {
                    reason: "target is a symlink to a non-directory".to_string(),
                }
            });
        }
        if !meta.is_dir() {
            return Ok(ResourceState::Invalid {
                reason: "target exists and is not a directory".to_string(),
            });
        }
        let mode = mode_of(&meta);
        if cfg!(unix) && mode != self.mode {
            return Ok(ResourceState::Incorrect {
                current: format!("mode {mode:o}"),
            });
        }
        Ok(ResourceState::Correct)
    }
}
