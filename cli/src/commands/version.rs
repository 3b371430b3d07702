//! Command: print version information.
use anyhow::Result;

/// Version string, overridable at build time through `DOTRENDER_VERSION`.
#[must_use]
pub fn version() -> &'static str {
    option_env!("DOTRENDER_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the version to stdout.
///
/// # Errors
///
/// Returns an error if stdout is closed.
pub fn run() -> Result<()> {
    super::emit(&format!("dotrender {}\n", version()))
}
