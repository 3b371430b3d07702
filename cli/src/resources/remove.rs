//! Removal resource for paths an exact external no longer provides.
use anyhow::Result;
use std::path::PathBuf;

use super::fs::remove_path;
use super::{Applicable, Resource, ResourceChange, ResourceState};

/// A path that must not exist.
#[derive(Debug, Clone)]
pub struct RemoveResource {
    /// Absolute target path.
    pub target: PathBuf,
}

impl RemoveResource {
    /// Create a new removal resource.
    #[must_use]
    pub const fn new(target: PathBuf) -> Self {
        Self { target }
    }
}

impl Applicable for RemoveResource {
    fn description(&self) -> String {
        self.target.display().to_string()
    }

    fn apply(&self) -> Result<ResourceChange> {
        remove_path(&self.target)?;
        Ok(ResourceChange::Applied)
    }
}

impl Resource for RemoveResource {
    fn current_state(&self) -> Result<ResourceState> {
        Ok(match self.target.symlink_metadata() {
            Err(_) => ResourceState::Correct,
            Ok(meta) if meta.is_dir() => ResourceState::Incorrect {
                current: "directory".to_string(),
            },
            Ok(_) => ResourceState::Incorrect {
                current: "file".to_string(),
            },
        })
    }
}
