//! Managed command: list the paths a plan writes.
use anyhow::Result;
use std::sync::Arc;

use crate::cli::GlobalOpts;
use crate::logging::Logger;
use crate::plan::{Action, Plan};

/// Run the managed command.
///
/// # Errors
///
/// Returns an error if configuration or planning fails.
pub fn run(global: &GlobalOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = super::CommandSetup::init(global, log.as_ref())?;
    let plan = setup.plan(global, false, log.as_ref())?;
    let mut out = String::new();
    for target in managed_targets(&plan) {
        out.push_str(&target);
        out.push('\n');
    }
    super::emit(&out)
}

/// Destination-relative targets the plan creates or updates, in plan order.
/// Removals are not listed.
#[must_use]
pub fn managed_targets(plan: &Plan) -> Vec<String> {
    plan.entries()
        .iter()
        .filter(|e| e.action != Action::Remove)
        .map(|e| e.target.display().to_string())
        .collect()
}
