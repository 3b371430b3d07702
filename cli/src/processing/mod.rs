//! Plan execution through the resource check + apply loop.
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use crate::error::ApplyError;
use crate::logging::Log;
use crate::plan::{Action, Plan, PlanEntry};
use crate::resources::{
    Applicable, DirResource, FileResource, RemoveResource, Resource, ResourceState,
};

/// Shared state for one execution.
#[derive(Clone)]
pub struct Context {
    /// Logger for output.
    pub log: Arc<dyn Log>,
    /// Log what would change without writing.
    pub dry_run: bool,
    /// Set by the Ctrl-C handler; checked between entries.
    pub interrupted: Arc<AtomicBool>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("log", &"<dyn Log>")
            .field("dry_run", &self.dry_run)
            .field("interrupted", &self.interrupted)
            .finish()
    }
}

impl Context {
    /// Create a context with a fresh interrupt flag.
    #[must_use]
    pub fn new(log: Arc<dyn Log>, dry_run: bool) -> Self {
        Self {
            log,
            dry_run,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// What happened to every plan entry.
///
/// # Examples
///
/// ```
/// use dotrender::processing::ApplyReport;
///
/// let mut report = ApplyReport::default();
/// report.changed.push(".bashrc".into());
/// report.unchanged.push(".config".into());
/// assert_eq!(report.summary(), "1 changed, 1 already ok");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Whether nothing was actually written.
    pub dry_run: bool,
    /// Entries that were (or would be) changed.
    pub changed: Vec<PathBuf>,
    /// Entries already in the desired state.
    pub unchanged: Vec<PathBuf>,
    /// The entry that failed and why.
    pub failed: Option<(PathBuf, String)>,
    /// Entries after the failure or interruption.
    pub not_attempted: Vec<PathBuf>,
}

impl ApplyReport {
    /// One-line summary, e.g. `"3 changed, 10 already ok"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "would change" } else { "changed" };
        let mut out = format!(
            "{} {verb}, {} already ok",
            self.changed.len(),
            self.unchanged.len()
        );
        if self.failed.is_some() {
            out.push_str(", 1 failed");
        }
        if !self.not_attempted.is_empty() {
            out.push_str(&format!(", {} not attempted", self.not_attempted.len()));
        }
        out
    }
}

/// Apply every entry of `plan` in order.
///
/// Stops at the first failure. There is no rollback: entries before the
/// failure stay applied.
///
/// # Errors
///
/// Returns [`ApplyError::Failed`] for the first entry that could not be
/// applied, or [`ApplyError::Interrupted`] when the interrupt flag is set.
pub fn execute_plan(ctx: &Context, plan: &Plan) -> Result<ApplyReport, ApplyError> {
    let mut report = ApplyReport {
        dry_run: ctx.dry_run,
        ..ApplyReport::default()
    };
    // Directories without an owner-write bit get their final mode after
    // everything inside them is written.
    let mut sealed: Vec<DirResource> = Vec::new();

    for (index, entry) in plan.entries().iter().enumerate() {
        if ctx.interrupted.load(Ordering::SeqCst) {
            report.not_attempted = remaining(plan, index);
            seal_after_abort(ctx, plan, &sealed);
            return Err(ApplyError::Interrupted(report));
        }
        match apply_entry(ctx, plan, entry, &mut sealed) {
            Ok(true) => report.changed.push(entry.target.clone()),
            Ok(false) => report.unchanged.push(entry.target.clone()),
            Err(e) => {
                report.failed = Some((entry.target.clone(), format!("{e:#}")));
                report.not_attempted = remaining(plan, index + 1);
                seal_after_abort(ctx, plan, &sealed);
                return Err(ApplyError::Failed {
                    path: entry.target.display().to_string(),
                    reason: format!("{e:#}"),
                    report,
                });
            }
        }
    }

    if let Err((target, reason)) = seal(plan, &sealed) {
        report.failed = Some((target.clone(), reason.clone()));
        return Err(ApplyError::Failed {
            path: target.display().to_string(),
            reason,
            report,
        });
    }
    Ok(report)
}

/// Give read-only directories their final mode, innermost first.
///
/// Stops at the first directory that cannot be sealed and returns its
/// destination-relative path with the reason.
fn seal(plan: &Plan, sealed: &[DirResource]) -> Result<(), (PathBuf, String)> {
    for dir in sealed.iter().rev() {
        if let Err(e) = dir.apply() {
            let target = dir
                .target
                .strip_prefix(plan.destination())
                .unwrap_or(dir.target.as_path())
                .to_path_buf();
            return Err((target, format!("{e:#}")));
        }
    }
    Ok(())
}

/// Seal what was opened before execution stopped early; the original error
/// wins, so sealing problems are only logged.
fn seal_after_abort(ctx: &Context, plan: &Plan, sealed: &[DirResource]) {
    if let Err((target, reason)) = seal(plan, sealed) {
        ctx.log.warn(&format!(
            "could not restore mode of {}: {reason}",
            target.display()
        ));
    }
}

fn remaining(plan: &Plan, from: usize) -> Vec<PathBuf> {
    plan.entries()
        .iter()
        .skip(from)
        .map(|e| e.target.clone())
        .collect()
}

/// Apply one entry; returns whether it changed (or would change).
fn apply_entry(
    ctx: &Context,
    plan: &Plan,
    entry: &PlanEntry,
    sealed: &mut Vec<DirResource>,
) -> Result<bool> {
    let path = plan.absolute(entry);
    match &entry.action {
        Action::File { content, mode } => {
            apply_resource(ctx, &FileResource::new(path, content.clone(), *mode))
        }
        Action::Remove => {
            let resource = RemoveResource::new(path);
            if !resource.needs_change()? {
                return Ok(false);
            }
            if ctx.dry_run {
                ctx.log.dry_run(&format!("would remove {}", resource.description()));
                return Ok(true);
            }
            resource.apply()?;
            ctx.log.debug(&format!("removed {}", resource.description()));
            Ok(true)
        }
        Action::Directory { mode } if mode & 0o200 == 0 => {
            let final_state = DirResource::new(path.clone(), *mode);
            let changed = final_state.needs_change()?;
            if ctx.dry_run {
                return apply_resource(ctx, &final_state);
            }
            apply_resource(ctx, &DirResource::new(path, mode | 0o200))?;
            sealed.push(final_state);
            Ok(changed)
        }
        Action::Directory { mode } => apply_resource(ctx, &DirResource::new(path, *mode)),
    }
}

fn apply_resource(ctx: &Context, resource: &dyn Resource) -> Result<bool> {
    let desc = resource.description();
    let verb = match resource.current_state()? {
        ResourceState::Correct => return Ok(false),
        ResourceState::Invalid { reason } => anyhow::bail!("{reason}"),
        ResourceState::Missing => "create",
        ResourceState::Incorrect { current } => {
            ctx.log.debug(&format!("{desc}: currently {current}"));
            "update"
        }
    };
    if ctx.dry_run {
        ctx.log.dry_run(&format!("would {verb} {desc}"));
        return Ok(true);
    }
    resource.apply()?;
    ctx.log.debug(&format!("{verb}d {desc}"));
    Ok(true)
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::config::prefixes::PrefixTable;
    use crate::logging::RecordingLog;
    use crate::plan::{PlanInputs, build_plan};
    use crate::platform::{Os, Platform};
    use crate::source::{EntryKind, SourceEntry};
    use crate::template::RenderContext;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn build(sources: &[SourceEntry], destination: &Path) -> Plan {
        let platform = Platform::new(Os::Linux, false, "box", destination.to_path_buf());
        let ctx =
            RenderContext::new(&platform, platform.builtin_flags(), BTreeMap::new(), BTreeMap::new())
                .unwrap();
        build_plan(&PlanInputs {
            sources,
            prefixes: &PrefixTable::default(),
            context: &ctx,
            externals: &[],
            destination,
        })
        .unwrap()
    }

    fn file(path: &str, content: &str) -> SourceEntry {
        SourceEntry {
            relative_path: PathBuf::from(path),
            kind: EntryKind::File,
            content: content.as_bytes().to_vec(),
        }
    }

    fn dir(path: &str) -> SourceEntry {
        SourceEntry {
            relative_path: PathBuf::from(path),
            kind: EntryKind::Directory,
            content: Vec::new(),
        }
    }

    fn context(dry_run: bool) -> (Context, Arc<RecordingLog>) {
        let log = Arc::new(RecordingLog::default());
        (Context::new(log.clone(), dry_run), log)
    }

    #[test]
    fn applies_then_reports_unchanged() {
        let dest = tempfile::tempdir().unwrap();
        let plan = build(
            &[dir("dot_config"), file("dot_config/app.toml", "k = 1\n")],
            dest.path(),
        );
        let (ctx, _) = context(false);

        let first = execute_plan(&ctx, &plan).unwrap();
        assert_eq!(first.summary(), "2 changed, 0 already ok");
        assert_eq!(
            std::fs::read_to_string(dest.path().join(".config/app.toml")).unwrap(),
            "k = 1\n"
        );

        let second = execute_plan(&ctx, &plan).unwrap();
        assert_eq!(second.summary(), "0 changed, 2 already ok");
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dest = tempfile::tempdir().unwrap();
        let plan = build(&[file("dot_bashrc", "x")], dest.path());
        let (ctx, log) = context(true);

        let report = execute_plan(&ctx, &plan).unwrap();
        assert_eq!(report.summary(), "1 would change, 0 already ok");
        assert!(!dest.path().join(".bashrc").exists());
        assert!(log.contains("would create"));
    }

    #[test]
    fn first_failure_stops_execution() {
        let dest = tempfile::tempdir().unwrap();
        std::fs::create_dir(dest.path().join(".b")).unwrap();
        let plan = build(
            &[file("dot_a", "1"), file("dot_b", "2"), file("dot_c", "3")],
            dest.path(),
        );
        let (ctx, _) = context(false);

        let err = execute_plan(&ctx, &plan).unwrap_err();
        let ApplyError::Failed { path, report, .. } = &err else {
            panic!("expected failure, got {err}");
        };
        assert_eq!(path, ".b");
        assert_eq!(report.changed, vec![PathBuf::from(".a")]);
        assert_eq!(report.not_attempted, vec![PathBuf::from(".c")]);
        assert!(report.failed.as_ref().unwrap().1.contains("directory"));
        assert!(!dest.path().join(".c").exists());
        assert_eq!(
            err.report().summary(),
            "1 changed, 0 already ok, 1 failed, 1 not attempted"
        );
    }

    #[test]
    fn interruption_reports_everything_not_attempted() {
        let dest = tempfile::tempdir().unwrap();
        let plan = build(&[file("dot_a", "1"), file("dot_b", "2")], dest.path());
        let (ctx, _) = context(false);
        ctx.interrupted.store(true, Ordering::SeqCst);

        let err = execute_plan(&ctx, &plan).unwrap_err();
        assert!(matches!(err, ApplyError::Interrupted(_)));
        assert_eq!(err.report().not_attempted.len(), 2);
        assert!(!dest.path().join(".a").exists());
    }

    #[cfg(unix)]
    #[test]
    fn read_only_directory_is_sealed_after_contents() {
        use crate::resources::fs::mode_of;

        let dest = tempfile::tempdir().unwrap();
        let plan = build(
            &[dir("readonly_share"), file("readonly_share/notes", "x")],
            dest.path(),
        );
        let (ctx, _) = context(false);

        execute_plan(&ctx, &plan).unwrap();
        let share = dest.path().join("share");
        assert_eq!(mode_of(&std::fs::metadata(&share).unwrap()), 0o555);
        assert_eq!(std::fs::read_to_string(share.join("notes")).unwrap(), "x");

        let again = execute_plan(&ctx, &plan).unwrap();
        assert_eq!(again.summary(), "0 changed, 2 already ok");
        assert_eq!(mode_of(&std::fs::metadata(&share).unwrap()), 0o555);
    }

    #[cfg(unix)]
    #[test]
    fn read_only_directory_is_sealed_when_a_later_entry_fails() {
        use crate::resources::fs::{mode_of, set_mode};

        let dest = tempfile::tempdir().unwrap();
        let locked = dest.path().join(".locked");
        std::fs::create_dir_all(locked.join("b")).unwrap();
        let plan = build(
            &[
                dir("private_readonly_dot_locked"),
                file("private_readonly_dot_locked/a", "1"),
                file("private_readonly_dot_locked/b", "2"),
            ],
            dest.path(),
        );
        let (ctx, _) = context(false);

        let err = execute_plan(&ctx, &plan).unwrap_err();
        assert!(matches!(err, ApplyError::Failed { ref path, .. } if path == ".locked/b"));
        assert_eq!(mode_of(&std::fs::metadata(&locked).unwrap()), 0o500);
        assert_eq!(std::fs::read_to_string(locked.join("a")).unwrap(), "1");

        set_mode(&locked, 0o700).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn read_only_directory_is_sealed_on_interruption() {
        use crate::resources::fs::{mode_of, set_mode};

        struct InterruptAfterFirst {
            flag: Arc<AtomicBool>,
        }
        impl Log for InterruptAfterFirst {
            fn stage(&self, _: &str) {}
            fn info(&self, _: &str) {}
            fn debug(&self, _: &str) {
                self.flag.store(true, Ordering::SeqCst);
            }
            fn warn(&self, _: &str) {}
            fn error(&self, _: &str) {}
            fn dry_run(&self, _: &str) {}
            fn record_task(&self, _: &str, _: crate::logging::TaskStatus, _: Option<&str>) {}
        }

        let dest = tempfile::tempdir().unwrap();
        let plan = build(
            &[
                dir("readonly_dot_share"),
                file("readonly_dot_share/notes", "x"),
            ],
            dest.path(),
        );
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = Context {
            log: Arc::new(InterruptAfterFirst { flag: flag.clone() }),
            dry_run: false,
            interrupted: flag,
        };

        let err = execute_plan(&ctx, &plan).unwrap_err();
        assert!(matches!(err, ApplyError::Interrupted(_)));
        assert_eq!(err.report().not_attempted, vec![PathBuf::from(".share/notes")]);
        let share = dest.path().join(".share");
        assert_eq!(mode_of(&std::fs::metadata(&share).unwrap()), 0o555);

        set_mode(&share, 0o755).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_read_only_directory_keeps_its_mode() {
        use crate::resources::fs::{mode_of, set_mode};

        let dest = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let real = elsewhere.path().join("cfg");
        std::fs::create_dir(&real).unwrap();
        set_mode(&real, 0o755).unwrap();
        std::os::unix::fs::symlink(&real, dest.path().join(".cfg")).unwrap();
        let plan = build(
            &[dir("readonly_dot_cfg"), file("readonly_dot_cfg/a", "1")],
            dest.path(),
        );
        let (ctx, _) = context(false);

        execute_plan(&ctx, &plan).unwrap();
        assert_eq!(mode_of(&std::fs::metadata(&real).unwrap()), 0o755);
        assert_eq!(std::fs::read_to_string(real.join("a")).unwrap(), "1");
    }
}
