//! Subcommand implementations and the setup they share.
pub mod apply;
pub mod data;
pub mod diff;
pub mod execute_template;
pub mod managed;
pub mod version;

use anyhow::{Context as _, Result};
use chrono::Utc;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::cli::GlobalOpts;
use crate::config::validation::validate_all;
use crate::config::{CONF_DIR, Config, SOURCE_DIR};
use crate::error::PlanError;
use crate::exec::SystemExecutor;
use crate::external::fetch::{Fetcher, HttpFetcher};
use crate::external::state::ExternalCache;
use crate::external::{ExternalResolver, FetchOptions, Outcome};
use crate::logging::{Log, TaskStatus};
use crate::plan::{Plan, PlanInputs, build_plan};
use crate::platform::Platform;
use crate::source;
use crate::template::RenderContext;

/// Shared state produced by the common command setup sequence.
///
/// Resolves the repository root and destination, detects the platform, loads
/// configuration and builds the template namespace, so each command does not
/// have to repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    /// Repository root.
    pub root: PathBuf,
    /// Directory the plan is applied to.
    pub destination: PathBuf,
    /// Detected host.
    pub platform: Platform,
    /// Loaded configuration.
    pub config: Config,
    /// Template namespace for this host.
    pub context: RenderContext,
}

impl CommandSetup {
    /// Resolve paths from CLI arguments, detect the host and load
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be determined, the platform is
    /// unsupported, or any configuration file is invalid.
    pub fn init(global: &GlobalOpts, log: &dyn Log) -> Result<Self> {
        let root = resolve_root(global)?;
        let platform = Platform::detect(&SystemExecutor)?;
        let destination = global
            .destination
            .clone()
            .unwrap_or_else(|| platform.home.clone());
        Self::load(root, destination, platform, log)
    }

    /// Load configuration for an explicit root, destination and platform.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration file is invalid or a template
    /// variable is defined twice.
    pub fn load(
        root: PathBuf,
        destination: PathBuf,
        platform: Platform,
        log: &dyn Log,
    ) -> Result<Self> {
        log.stage("Loading configuration");
        log.debug(&format!("root: {}", root.display()));
        log.debug(&format!("destination: {}", destination.display()));
        log.debug(&format!("platform: {} on {}", platform.os, platform.hostname));

        let config = Config::load(&root)
            .with_context(|| format!("loading configuration from {}", root.display()))?;
        log.info(&format!(
            "loaded {} prefix tokens, {} externals",
            config.prefixes.tokens().count(),
            config.externals.len()
        ));

        let warnings = validate_all(&config);
        if !warnings.is_empty() {
            log.warn(&format!(
                "found {} configuration warning(s):",
                warnings.len()
            ));
            for warning in &warnings {
                log.warn(&format!(
                    "  {} [{}]: {}",
                    warning.source, warning.item, warning.message
                ));
            }
        }

        let context = config.variables.render_context(&platform)?;
        Ok(Self {
            root,
            destination,
            platform,
            config,
            context,
        })
    }

    /// Scan the source tree, resolve externals and build the plan using the
    /// real fetcher and the default cache.
    ///
    /// # Errors
    ///
    /// See [`plan_with`](Self::plan_with).
    pub fn plan(&self, global: &GlobalOpts, refresh: bool, log: &dyn Log) -> Result<Plan> {
        let cache = ExternalCache::default_location();
        let opts = FetchOptions {
            refresh,
            parallel: global.parallel,
            now: Utc::now(),
        };
        self.plan_with(&HttpFetcher, cache.as_ref(), &opts, log)
    }

    /// Scan the source tree, resolve externals through `fetcher` and build
    /// the plan.
    ///
    /// Template errors are logged one by one before the combined error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the source tree cannot be read or the plan fails
    /// validation.
    pub fn plan_with(
        &self,
        fetcher: &dyn Fetcher,
        cache: Option<&ExternalCache>,
        opts: &FetchOptions,
        log: &dyn Log,
    ) -> Result<Plan> {
        log.stage("Scanning source tree");
        let sources = source::scan(&self.config.source_dir())?;
        log.info(&format!("{} source entries", sources.len()));

        let externals = if self.config.externals.is_empty() {
            Vec::new()
        } else {
            log.stage("Resolving externals");
            let resolver = ExternalResolver::new(fetcher, cache, &self.destination, log);
            let resolved = resolver.resolve_all(&self.config.externals, opts);
            let fetched = resolved
                .iter()
                .filter(|r| r.outcome == Outcome::Fetched)
                .count();
            let degraded = resolved
                .iter()
                .filter(|r| matches!(r.outcome, Outcome::Fallback | Outcome::Unavailable))
                .count();
            let message = format!(
                "{fetched} fetched, {} cached, {degraded} degraded",
                resolved.len() - fetched - degraded
            );
            let status = if degraded > 0 {
                TaskStatus::Degraded
            } else {
                TaskStatus::Ok
            };
            log.record_task("Resolve externals", status, Some(&message));
            resolved
        };

        log.stage("Building plan");
        let inputs = PlanInputs {
            sources: &sources,
            prefixes: &self.config.prefixes,
            context: &self.context,
            externals: &externals,
            destination: &self.destination,
        };
        match build_plan(&inputs) {
            Ok(plan) => {
                log.info(&format!("{} plan entries", plan.len()));
                log.record_task("Build plan", TaskStatus::Ok, None);
                Ok(plan)
            }
            Err(PlanError::Templates(errors)) => {
                for error in &errors {
                    log.error(&error.to_string());
                }
                let message = format!("{} template(s) failed to render", errors.len());
                log.record_task("Build plan", TaskStatus::Failed, Some(&message));
                anyhow::bail!(message)
            }
            Err(e) => {
                log.record_task("Build plan", TaskStatus::Failed, Some(&e.to_string()));
                Err(e.into())
            }
        }
    }
}

/// Resolve the repository root from CLI arguments or auto-detection.
///
/// # Errors
///
/// Returns an error if no candidate directory holds `conf/` or `home/`.
pub fn resolve_root(global: &GlobalOpts) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("reading current directory")?;
    resolve_root_from(
        global.root.as_deref(),
        std::env::var_os("DOTRENDER_ROOT").map(PathBuf::from),
        std::env::current_exe().ok(),
        &cwd,
    )
}

/// Root resolution with every input explicit: `--root`, `DOTRENDER_ROOT`,
/// the binary's location, then the current directory.
///
/// # Errors
///
/// Returns an error if no candidate directory holds `conf/` or `home/`.
pub fn resolve_root_from(
    flag: Option<&Path>,
    env: Option<PathBuf>,
    exe: Option<PathBuf>,
    cwd: &Path,
) -> Result<PathBuf> {
    if let Some(root) = flag {
        return Ok(root.to_path_buf());
    }
    if let Some(root) = env {
        return Ok(root);
    }

    let is_repo = |dir: &Path| dir.join(CONF_DIR).is_dir() || dir.join(SOURCE_DIR).is_dir();

    if let Some(parent) = exe.as_deref().and_then(Path::parent) {
        let candidates = [
            parent.join("../../.."), // cli/target/release/ → repo root
            parent.join(".."),       // bin/ → repo root
        ];
        for candidate in &candidates {
            if is_repo(candidate) {
                return dunce::canonicalize(candidate)
                    .with_context(|| format!("resolving {}", candidate.display()));
            }
        }
    }

    if is_repo(cwd) {
        return Ok(cwd.to_path_buf());
    }

    anyhow::bail!("cannot determine repository root. Use --root or set DOTRENDER_ROOT")
}

/// Write command output to stdout.
///
/// # Errors
///
/// Returns an error if stdout is closed.
pub fn emit(text: &str) -> Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(text.as_bytes()).context("writing to stdout")?;
    out.flush().context("flushing stdout")
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins_over_everything() {
        let cwd = tempfile::tempdir().unwrap();
        std::fs::create_dir(cwd.path().join("conf")).unwrap();
        let root = resolve_root_from(
            Some(Path::new("/explicit")),
            Some(PathBuf::from("/env")),
            None,
            cwd.path(),
        )
        .unwrap();
        assert_eq!(root, PathBuf::from("/explicit"));
    }

    #[test]
    fn env_wins_over_detection() {
        let cwd = tempfile::tempdir().unwrap();
        std::fs::create_dir(cwd.path().join("home")).unwrap();
        let root = resolve_root_from(None, Some(PathBuf::from("/env")), None, cwd.path()).unwrap();
        assert_eq!(root, PathBuf::from("/env"));
    }

    #[test]
    fn binary_relative_root() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::create_dir(repo.path().join("conf")).unwrap();
        let bin = repo.path().join("cli/target/release");
        std::fs::create_dir_all(&bin).unwrap();
        let cwd = tempfile::tempdir().unwrap();

        let root =
            resolve_root_from(None, None, Some(bin.join("dotrender")), cwd.path()).unwrap();
        assert_eq!(root, dunce::canonicalize(repo.path()).unwrap());
    }

    #[test]
    fn current_directory_fallback() {
        let cwd = tempfile::tempdir().unwrap();
        std::fs::create_dir(cwd.path().join("home")).unwrap();
        let root = resolve_root_from(None, None, None, cwd.path()).unwrap();
        assert_eq!(root, cwd.path());
    }

    #[test]
    fn no_repository_is_an_error() {
        let cwd = tempfile::tempdir().unwrap();
        let err = resolve_root_from(None, None, None, cwd.path()).unwrap_err();
        assert!(err.to_string().contains("--root"), "{err}");
    }
}
