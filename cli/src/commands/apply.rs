//! Apply command implementation.
use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::cli::{GlobalOpts, PlanOpts};
use crate::logging::{Log, Logger, TaskStatus};
use crate::plan::Plan;
use crate::processing::{self, ApplyReport, Context};

/// Run the apply command.
///
/// # Errors
///
/// Returns an error if configuration, planning or execution fails.
pub fn run(
    global: &GlobalOpts,
    opts: &PlanOpts,
    log: &Arc<Logger>,
    interrupted: Arc<AtomicBool>,
) -> Result<()> {
    let result = super::CommandSetup::init(global, log.as_ref())
        .and_then(|setup| setup.plan(global, opts.refresh_externals, log.as_ref()))
        .and_then(|plan| {
            let ctx = Context {
                log: Arc::clone(log) as Arc<dyn Log>,
                dry_run: global.dry_run,
                interrupted,
            };
            execute(&ctx, &plan).map(|_| ())
        });
    log.print_summary();
    result
}

/// Execute `plan` and record the outcome as the "Apply plan" phase.
///
/// # Errors
///
/// Returns the [`crate::error::ApplyError`] from execution.
pub fn execute(ctx: &Context, plan: &Plan) -> Result<ApplyReport> {
    ctx.log.stage(if ctx.dry_run {
        "Applying plan (dry run)"
    } else {
        "Applying plan"
    });
    match processing::execute_plan(ctx, plan) {
        Ok(report) => {
            let status = if ctx.dry_run {
                TaskStatus::DryRun
            } else {
                TaskStatus::Ok
            };
            ctx.log.info(&report.summary());
            ctx.log
                .record_task("Apply plan", status, Some(&report.summary()));
            Ok(report)
        }
        Err(e) => {
            if let Some((path, reason)) = &e.report().failed {
                ctx.log
                    .error(&format!("{}: {reason}", path.display()));
            }
            ctx.log
                .record_task("Apply plan", TaskStatus::Failed, Some(&e.report().summary()));
            Err(e.into())
        }
    }
}
