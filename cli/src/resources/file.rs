//! Regular file resource.
use anyhow::{Context as _, Result};
use std::path::PathBuf;

use super::fs::{ensure_parent_dir, mode_of, remove_existing, set_mode};
use super::{Applicable, Resource, ResourceChange, ResourceState};

/// A file with exact content and permission bits.
#[derive(Debug, Clone)]
pub struct FileResource {
    /// Absolute target path.
    pub target: PathBuf,
    /// Desired content.
    pub content: Vec<u8>,
    /// Desired permission bits.
    pub mode: u32,
}

impl FileResource {
    /// Create a new file resource.
    #[must_use]
    pub const fn new(target: PathBuf, content: Vec<u8>, mode: u32) -> Self {
        Self {
            target,
            content,
            mode,
        }
    }
}

impl Applicable for FileResource {
    fn description(&self) -> String {
        format!("{} ({:o})", self.target.display(), self.mode)
    }

    fn apply(&self) -> Result<ResourceChange> {
        ensure_parent_dir(&self.target)?;
        // Replacing rather than truncating works for read-only files and
        // never writes through a symlink.
        remove_existing(&self.target)?;
        std::fs::write(&self.target, &self.content)
            .with_context(|| format!("write: {}", self.target.display()))?;
        set_mode(&self.target, self.mode)?;
        Ok(ResourceChange::Applied)
    }
}

impl Resource for FileResource {
    fn current_state(&self) -> Result<ResourceState> {
        let Ok(meta) = self.target.symlink_metadata() else {
            return Ok(ResourceState::Missing);
        };
        if meta.is_dir() {
            return Ok(ResourceState::Invalid {
                reason: "target is a directory".to_string(),
            });
        }
        if meta.file_type().is_symlink() {
            return Ok(ResourceState::Incorrect {
                current: "symlink".to_string(),
            });
        }

        let current = std::fs::read(&self.target)
            .with_context(|| format!("read: {}", self.target.display()))?;
        if current != self.content {
            return Ok(ResourceState::Incorrect {
                current: "content differs".to_string(),
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
