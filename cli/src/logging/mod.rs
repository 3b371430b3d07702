//! Console and log-file output for every command.
//!
//! Commands talk to a [`Log`]; the production [`Logger`] turns each call into
//! a [`tracing`] event carrying a `kind` field (`stage`, `dry_run`, `summary`)
//! that the console formatter and the file layer in [`init_subscriber`]
//! render differently. Phase results recorded with [`Log::record_task`] are
//! replayed as a summary at the end of `apply`.
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

mod logger;
mod subscriber;

pub use logger::Logger;
pub use subscriber::init_subscriber;

/// Outcome of one phase of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Phase completed.
    Ok,
    /// Phase completed using previous downloads for some externals.
    Degraded,
    /// Nothing to do.
    Skipped,
    /// Phase only reported what it would change.
    DryRun,
    /// Phase stopped with an error.
    Failed,
}

impl TaskStatus {
    /// Short lowercase tag used in the log file.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Skipped => "skipped",
            Self::DryRun => "dry-run",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Sink for progress messages.
///
/// Library code takes `&dyn Log` so tests can substitute a recording double.
pub trait Log: Send + Sync {
    /// Announce a major step such as "Resolving externals".
    fn stage(&self, msg: &str);
    /// Informational message.
    fn info(&self, msg: &str);
    /// Detail shown only with `--verbose`; always kept in the log file.
    fn debug(&self, msg: &str);
    /// Recoverable problem.
    fn warn(&self, msg: &str);
    /// Failure.
    fn error(&self, msg: &str);
    /// Change that a dry run would have made.
    fn dry_run(&self, msg: &str);
    /// Remember a phase result for the closing summary.
    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>);
}

/// `$XDG_CACHE_HOME/dotrender`, falling back to `$HOME/.cache/dotrender`.
///
/// Holds run logs and downloaded externals. Created on first use; `None`
/// when it cannot be created.
#[must_use]
pub fn cache_dir() -> Option<PathBuf> {
    let dir = cache_dir_from(std::env::var_os("XDG_CACHE_HOME"), std::env::var_os("HOME"));
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

fn cache_dir_from(xdg_cache_home: Option<OsString>, home: Option<OsString>) -> PathBuf {
    let base = xdg_cache_home
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            home.map_or_else(|| PathBuf::from("."), PathBuf::from)
                .join(".cache")
        });
    base.join("dotrender")
}

/// Log file for one run of `command`, inside [`cache_dir`].
fn log_file_path(command: &str) -> Option<PathBuf> {
    Some(cache_dir()?.join("logs").join(format!("{command}.log")))
}

/// A [`Logger`] writing to a fresh file through a thread-local subscriber.
///
/// Keep the returned guard alive for the duration of the test.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};

    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("logs").join("test.log");
    let layer = subscriber::FileLayer::create(&path, "test").expect("file layer");
    let subscriber = tracing_subscriber::registry().with(layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
    (Logger::with_log_file(Some(path)), tmp, guard)
}

/// [`Log`] double that records every message as `"<level>: <msg>"`.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingLog {
    lines: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingLog {
    fn push(&self, level: &str, msg: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(format!("{level}: {msg}"));
        }
    }

    /// All recorded lines in order.
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Whether any recorded line contains `needle`.
    pub(crate) fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

#[cfg(test)]
impl Log for RecordingLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push("dry-run", msg);
    }
    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        self.push("task", &format!("{name} {status:?} {}", message.unwrap_or_default()));
    }
}
