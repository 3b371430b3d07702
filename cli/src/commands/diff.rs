//! Diff command: show what `apply` would change.
use anyhow::{Context as _, Result};
use similar::TextDiff;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use crate::cli::{GlobalOpts, PlanOpts};
use crate::logging::Logger;
use crate::plan::{Action, Plan};
use crate::resources::fs::mode_of;

/// Run the diff command.
///
/// # Errors
///
/// Returns an error if configuration or planning fails, or the destination
/// cannot be read.
pub fn run(global: &GlobalOpts, opts: &PlanOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = super::CommandSetup::init(global, log.as_ref())?;
    let plan = setup.plan(global, opts.refresh_externals, log.as_ref())?;
    let text = render(&plan)?;
    if text.is_empty() {
        log.info("no changes");
    }
    super::emit(&text)
}

/// Describe every difference between `plan` and the destination: unified
/// diffs for text files, one line for everything else.
///
/// Paths at or below an earlier removal are compared as if already gone.
///
/// # Errors
///
/// Returns an error if an existing target cannot be read.
pub fn render(plan: &Plan) -> Result<String> {
    let mut out = String::new();
    let mut removed: Vec<&Path> = Vec::new();
    for entry in plan.entries() {
        let absolute = plan.absolute(entry);
        let display = entry.target.display();
        let meta = if removed.iter().any(|r| entry.target.starts_with(r)) {
            None
        } else {
            absolute.symlink_metadata().ok()
        };
        match &entry.action {
            Action::Directory { mode } => match meta {
                None => writeln!(out, "new directory {display} ({mode:o})")?,
                Some(m) if !m.is_dir() && !absolute.is_dir() => {
                    writeln!(out, "directory {display} is blocked by a file")?;
                }
                Some(m) if !m.file_type().is_symlink() && cfg!(unix) && mode_of(&m) != *mode => {
                    writeln!(out, "mode {display}: {:o} -> {mode:o}", mode_of(&m))?;
                }
                Some(_) => {}
            },
            Action::Remove => {
                if meta.is_some() {
                    writeln!(out, "remove {display}")?;
                    removed.push(&entry.target);
                }
            }
            Action::File { content, mode } => {
                let old = match &meta {
                    Some(m) if m.is_file() => Some(
                        std::fs::read(&absolute)
                            .with_context(|| format!("read: {}", absolute.display()))?,
                    ),
                    Some(m) if m.is_dir() => {
                        writeln!(out, "file {display} is blocked by a directory")?;
                        continue;
                    }
                    _ => None,
                };
                if old.as_deref() != Some(content.as_slice()) {
                    write_content_diff(&mut out, &entry.target, old.as_deref(), content)?;
                }
                if let Some(m) = meta.filter(|m| m.is_file())
                    && cfg!(unix)
                    && mode_of(&m) != *mode
                {
                    writeln!(out, "mode {display}: {:o} -> {mode:o}", mode_of(&m))?;
                }
            }
        }
    }
    Ok(out)
}

fn write_content_diff(
    out: &mut String,
    target: &Path,
    old: Option<&[u8]>,
    new: &[u8],
) -> Result<()> {
    let old_text = old.map_or(Some(""), |b| std::str::from_utf8(b).ok());
    let (Some(old_text), Ok(new_text)) = (old_text, std::str::from_utf8(new)) else {
        writeln!(out, "binary file {} differs", target.display())?;
        return Ok(());
    };
    let old_header = if old.is_some() {
        format!("a/{}", target.display())
    } else {
        "/dev/null".to_string()
    };
    let diff = TextDiff::from_lines(old_text, new_text)
        .unified_diff()
        .header(&old_header, &format!("b/{}", target.display()))
        .to_string();
    out.push_str(&diff);
    Ok(())
}
