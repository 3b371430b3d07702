//! Idempotent filesystem primitives (check + apply pattern).
pub mod dir;
pub mod file;
pub mod fs;
pub mod remove;

use anyhow::Result;

pub use dir::DirResource;
pub use file::FileResource;
pub use remove::RemoveResource;

/// Minimal interface for resources that can be described and applied.
pub trait Applicable {
    /// Human-readable description of this resource.
    fn description(&self) -> String;

    /// Bring the target into the desired state.
    ///
    /// # Errors
    ///
    /// Returns an error if the filesystem refuses the change.
    fn apply(&self) -> Result<ResourceChange>;
}

/// State of a target path relative to what the plan wants.
///
/// # Examples
///
/// ```
/// use dotrender::resources::ResourceState;
///
/// let missing = ResourceState::Missing;
/// let wrong = ResourceState::Incorrect { current: "mode 644".into() };
///
/// assert_ne!(missing, ResourceState::Correct);
/// assert_eq!(wrong, ResourceState::Incorrect { current: "mode 644".into() });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Target does not exist.
    Missing,
    /// Target already matches.
    Correct,
    /// Target exists but differs.
    Incorrect {
        /// What is currently there.
        current: String,
    },
    /// Target cannot be brought into the desired state without destroying
    /// something the plan does not own.
    Invalid {
        /// Why.
        reason: String,
    },
}

/// Result of applying a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    /// Target was created, rewritten or removed.
    Applied,
    /// Nothing to do.
    AlreadyCorrect,
}

/// A resource that can inspect its own target.
pub trait Resource: Applicable {
    /// Inspect the target.
    ///
    /// # Errors
    ///
    /// Returns an error if the target exists but cannot be read.
    fn current_state(&self) -> Result<ResourceState>;

    /// Whether [`Applicable::apply`] would change anything.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`current_state`](Self::current_state).
    fn needs_change(&self) -> Result<bool> {
        Ok(matches!(
            self.current_state()?,
            ResourceState::Missing | ResourceState::Incorrect { .. }
        ))
    }
}
