//! Data command: print the template namespace.
use anyhow::{Context as _, Result};
use std::sync::Arc;

use crate::cli::GlobalOpts;
use crate::logging::Logger;
use crate::template::RenderContext;

/// Run the data command.
///
/// # Errors
///
/// Returns an error if configuration fails to load.
pub fn run(global: &GlobalOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = super::CommandSetup::init(global, log.as_ref())?;
    super::emit(&to_json(&setup.context)?)
}

/// Pretty-printed JSON of every variable, keys sorted.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json(ctx: &RenderContext) -> Result<String> {
    let mut json =
        serde_json::to_string_pretty(ctx.namespace()).context("serializing template data")?;
    json.push('\n');
    Ok(json)
}
