//! The production [`Log`] implementation.
use std::path::PathBuf;
use std::sync::Mutex;

use super::{Log, TaskStatus, log_file_path};

/// A phase result kept for the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Phase {
    name: String,
    status: TaskStatus,
    message: Option<String>,
}

/// Emits [`tracing`] events and collects phase results.
///
/// Messages reach the console and `<cache>/logs/<command>.log` through the
/// layers installed by [`init_subscriber`](super::init_subscriber).
#[derive(Debug)]
pub struct Logger {
    phases: Mutex<Vec<Phase>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Logger for `command`, pointing its summary at that command's log file.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self::with_log_file(log_file_path(command))
    }

    /// Logger whose summary names `log_file`.
    #[must_use]
    pub const fn with_log_file(log_file: Option<PathBuf>) -> Self {
        Self {
            phases: Mutex::new(Vec::new()),
            log_file,
        }
    }

    /// Log a failure.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a recoverable problem.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header.
    pub fn stage(&self, msg: &str) {
        tracing::info!(kind = "stage", "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a detail shown only with `--verbose`.
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a change a dry run would make.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(kind = "dry_run", "{msg}");
    }

    /// Remember a phase result; it is logged at debug level immediately and
    /// again in [`Self::print_summary`].
    pub fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        tracing::debug!("phase '{name}' finished: {status}");
        if let Ok(mut phases) = self.phases.lock() {
            phases.push(Phase {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Log every recorded phase, then the log file location.
    pub fn print_summary(&self) {
        let phases = self.phases.lock().map_or_else(|_| vec![], |g| g.clone());
        if phases.is_empty() {
            return;
        }

        self.stage("Summary");
        for phase in &phases {
            let detail = phase
                .message
                .as_deref()
                .map_or_else(String::new, |m| format!(" ({m})"));
            tracing::info!(kind = "summary", status = phase.status.tag(), "{}{detail}", phase.name);
        }
        if let Some(path) = &self.log_file {
            self.debug(&format!("log: {}", path.display()));
        }
    }
}

macro_rules! forward {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                Self::$method(self, msg);
            }
        )+
    };
}

impl Log for Logger {
    forward!(stage, info, debug, warn, error, dry_run);

    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        Self::record_task(self, name, status, message);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;

    fn file_contents(log: &Logger) -> String {
        std::fs::read_to_string(log.log_file.as_ref().expect("log path")).unwrap()
    }

    #[test]
    fn file_starts_with_run_header() {
        let (log, _tmp, _guard) = isolated_logger();
        assert!(file_contents(&log).starts_with("# dotrender "));
    }

    #[test]
    fn debug_reaches_file() {
        let (log, _tmp, _guard) = isolated_logger();
        log.debug("resolved 3 externals");
        assert!(file_contents(&log).contains("DEBUG resolved 3 externals"));
    }

    #[test]
    fn stage_and_dry_run_are_marked() {
        let (log, _tmp, _guard) = isolated_logger();
        log.stage("Building plan");
        log.dry_run("would create .bashrc");
        let contents = file_contents(&log);
        assert!(contents.contains("==> Building plan"), "{contents}");
        assert!(contents.contains("[dry run] would create .bashrc"), "{contents}");
    }

    #[test]
    fn summary_replays_phases_with_status() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_task("Resolve externals", TaskStatus::Degraded, Some("0 fetched, 0 cached, 1 degraded"));
        log.record_task("Apply plan", TaskStatus::Ok, Some("3 changed, 1 already ok"));
        log.print_summary();
        let contents = file_contents(&log);
        assert!(contents.contains("==> Summary"));
        assert!(contents.contains("[degraded] Resolve externals (0 fetched, 0 cached, 1 degraded)"));
        assert!(contents.contains("[ok] Apply plan (3 changed, 1 already ok)"));
    }

    #[test]
    fn empty_summary_prints_nothing() {
        let (log, _tmp, _guard) = isolated_logger();
        log.print_summary();
        assert!(!file_contents(&log).contains("Summary"));
    }

    #[test]
    fn trait_calls_reach_the_logger() {
        let (log, _tmp, _guard) = isolated_logger();
        let dyn_log: &dyn Log = &log;
        dyn_log.warn("cached download unusable");
        dyn_log.record_task("Build plan", TaskStatus::Failed, None);
        assert_eq!(log.phases.lock().unwrap().len(), 1);
        assert!(file_contents(&log).contains("WARN  cached download unusable"));
    }
}
