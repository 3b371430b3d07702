//! External resources: archives and single files fetched from URLs and
//! merged into the target tree.
//!
//! Resolution never touches the destination. It produces the entries each
//! external provides so the planner can validate them together with the
//! source tree before anything is written.
pub mod archive;
pub mod fetch;
pub mod glob;
pub mod state;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::externals::{ExternalKind, ExternalSpec};
use crate::error::{ConfigError, FetchError};
use crate::logging::Log;
use crate::source::EntryKind;
pub use fetch::{Fetcher, HttpFetcher};
pub use state::{ExternalCache, ExternalRecord, FetchState};

/// A file or directory provided by an external.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalEntry {
    /// Path relative to the destination directory.
    pub target: PathBuf,
    /// File or directory.
    pub kind: EntryKind,
    /// Permission bits.
    pub mode: u32,
    /// File content; empty for directories.
    pub content: Vec<u8>,
}

/// Where the content of a resolved external came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Downloaded during this run.
    Fetched,
    /// Not due for refresh; previous download reused.
    Cached,
    /// Download failed; previous download reused.
    Fallback,
    /// Download failed and nothing was cached.
    Unavailable,
}

/// An external after fetching and filtering.
#[derive(Debug, Clone)]
pub struct ResolvedExternal {
    /// The declaration.
    pub spec: ExternalSpec,
    /// Where the content came from.
    pub outcome: Outcome,
    /// Provided entries, ordered by path. Empty when unavailable.
    pub entries: Vec<ExternalEntry>,
}

impl ResolvedExternal {
    /// Whether the external contributes to the plan at all.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.outcome != Outcome::Unavailable
    }

    /// Paths under the mount in `destination` that an exact external no
    /// longer provides, relative to `destination`.
    ///
    /// A path it still provides is stale too when its kind changed: a
    /// directory where a file is provided, or anything but a directory where
    /// a directory is provided.
    ///
    /// Stale directories are reported once; their contents are not listed.
    /// Non-exact and unavailable externals never report stale paths.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the mount cannot be listed.
    pub fn stale_paths(&self, destination: &Path) -> Result<Vec<PathBuf>, ConfigError> {
        if !self.spec.exact || !self.is_available() || self.spec.kind != ExternalKind::Archive {
            return Ok(Vec::new());
        }
        let provided: BTreeMap<&Path, EntryKind> = self
            .entries
            .iter()
            .map(|e| (e.target.as_path(), e.kind))
            .collect();
        let mut stale = Vec::new();
        collect_stale(destination, &self.spec.mount, &provided, &mut stale)?;
        Ok(stale)
    }
}

fn collect_stale(
    destination: &Path,
    relative: &Path,
    provided: &BTreeMap<&Path, EntryKind>,
    out: &mut Vec<PathBuf>,
) -> Result<(), ConfigError> {
    let dir = destination.join(relative);
    if !dir.is_dir() {
        return Ok(());
    }
    let io_err = |source| ConfigError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut names = std::fs::read_dir(&dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    names.sort();

    for name in names {
        let rel = relative.join(name);
        let path = destination.join(&rel);
        let real_dir = std::fs::symlink_metadata(&path).is_ok_and(|m| m.is_dir());
        match provided.get(rel.as_path()) {
            None => out.push(rel),
            Some(EntryKind::File) if real_dir => out.push(rel),
            Some(EntryKind::Directory) if !path.is_dir() => out.push(rel),
            Some(EntryKind::Directory) if real_dir => {
                collect_stale(destination, &rel, provided, out)?;
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Options for one resolution pass.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Fetch every external regardless of its refresh period.
    pub refresh: bool,
    /// Fetch externals concurrently.
    pub parallel: bool,
    /// Reference time for refresh decisions and new records.
    pub now: DateTime<Utc>,
}

/// Fetches, caches and filters externals for one destination.
#[derive(Clone, Copy)]
pub struct ExternalResolver<'a> {
    fetcher: &'a dyn Fetcher,
    cache: Option<&'a ExternalCache>,
    destination: &'a Path,
    log: &'a dyn Log,
}

impl std::fmt::Debug for ExternalResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalResolver")
            .field("cache", &self.cache)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

impl<'a> ExternalResolver<'a> {
    /// Create a resolver. Without a cache every external is fetched and a
    /// failed fetch leaves its mount untouched.
    #[must_use]
    pub fn new(
        fetcher: &'a dyn Fetcher,
        cache: Option<&'a ExternalCache>,
        destination: &'a Path,
        log: &'a dyn Log,
    ) -> Self {
        Self {
            fetcher,
            cache,
            destination,
            log,
        }
    }

    /// Resolve every external and persist updated fetch records.
    #[must_use]
    pub fn resolve_all(
        &self,
        specs: &[ExternalSpec],
        opts: &FetchOptions,
    ) -> Vec<ResolvedExternal> {
        let mut state = self.cache.map(ExternalCache::load_state).unwrap_or_default();

        let resolve = |spec: &ExternalSpec| self.resolve_one(spec, &state, opts);
        let results: Vec<_> = if opts.parallel {
            specs.par_iter().map(resolve).collect()
        } else {
            specs.iter().map(resolve).collect()
        };

        let mut resolved = Vec::with_capacity(results.len());
        let mut updated = false;
        for (external, record) in results {
            if let Some((key, record)) = record {
                state.records.insert(key, record);
                updated = true;
            }
            resolved.push(external);
        }

        if updated
            && let Some(cache) = self.cache
            && let Err(e) = cache.save_state(&state)
        {
            self.log.warn(&format!("could not save external fetch state: {e:#}"));
        }
        resolved
    }

    fn resolve_one(
        &self,
        spec: &ExternalSpec,
        state: &FetchState,
        opts: &FetchOptions,
    ) -> (ResolvedExternal, Option<(String, ExternalRecord)>) {
        let mount = spec.mount.display();
        let key = state::record_key(self.destination, &spec.mount);
        let cached = self.cache.and_then(|c| c.read_archive(&key));
        let record = state.records.get(&key);

        let due = opts.refresh
            || cached.is_none()
            || record.is_none_or(|r| r.is_stale(spec, opts.now));

        if !due && let Some(bytes) = &cached {
            self.log.debug(&format!("{mount}: using cached download"));
            match convert(spec, bytes) {
                Ok(entries) => return (resolved(spec, Outcome::Cached, entries), None),
                Err(e) => self.log.warn(&format!("{mount}: cached download unusable: {e}")),
            }
        }

        self.log.debug(&format!("{mount}: fetching {}", spec.url));
        let fetched = self
            .fetcher
            .fetch(&spec.url)
            .and_then(|bytes| convert(spec, &bytes).map(|entries| (bytes, entries)));

        match fetched {
            Ok((bytes, entries)) => {
                if let Some(cache) = self.cache
                    && let Err(e) = cache.write_archive(&key, &bytes)
                {
                    self.log.warn(&format!("{mount}: could not cache download: {e:#}"));
                }
                let record = ExternalRecord {
                    url: spec.url.clone(),
                    fetched_at: opts.now,
                    sha256: state::sha256_hex(&bytes),
                };
                (
                    resolved(spec, Outcome::Fetched, entries),
                    Some((key, record)),
                )
            }
            Err(e) => (self.fall_back(spec, &e, cached.as_deref()), None),
        }
    }

    fn fall_back(
        &self,
        spec: &ExternalSpec,
        error: &FetchError,
        cached: Option<&[u8]>,
    ) -> ResolvedExternal {
        let mount = spec.mount.display();
        let retry = if error.is_retryable() {
            " (will retry next run)"
        } else {
            ""
        };
        if let Some(entries) = cached.and_then(|bytes| convert(spec, bytes).ok()) {
            self.log.warn(&format!(
                "{mount}: {error}{retry}; using previous download"
            ));
            return resolved(spec, Outcome::Fallback, entries);
        }
        self.log.warn(&format!(
            "{mount}: {error}{retry}; no previous download, leaving it untouched"
        ));
        resolved(spec, Outcome::Unavailable, Vec::new())
    }
}

fn resolved(spec: &ExternalSpec, outcome: Outcome, entries: Vec<ExternalEntry>) -> ResolvedExternal {
    ResolvedExternal {
        spec: spec.clone(),
        outcome,
        entries,
    }
}

/// Turn downloaded bytes into entries under the mount path.
///
/// # Errors
///
/// Returns [`FetchError::Archive`] when an archive cannot be read.
pub fn convert(spec: &ExternalSpec, bytes: &[u8]) -> Result<Vec<ExternalEntry>, FetchError> {
    if spec.kind == ExternalKind::File {
        return Ok(vec![ExternalEntry {
            target: spec.mount.clone(),
            kind: EntryKind::File,
            mode: 0o644,
            content: bytes.to_vec(),
        }]);
    }

    let listing = archive::read_entries(&spec.url, bytes)?;
    let selected = archive::select(listing, &spec.include, &spec.exclude, spec.strip_components);

    let mut entries: BTreeMap<PathBuf, ExternalEntry> = BTreeMap::new();
    for entry in selected {
        let target = spec.mount.join(&entry.path);
        // Directories between the mount and each entry, even if the archive
        // has no explicit entries for them.
        for ancestor in target.ancestors().skip(1) {
            if ancestor == spec.mount || !ancestor.starts_with(&spec.mount) {
                break;
            }
            entries
                .entry(ancestor.to_path_buf())
                .or_insert_with(|| ExternalEntry {
                    target: ancestor.to_path_buf(),
                    kind: EntryKind::Directory,
                    mode: 0o755,
                    content: Vec::new(),
                });
        }
        entries.insert(
            target.clone(),
            ExternalEntry {
                target,
                kind: entry.kind,
                mode: entry.mode,
                content: entry.content,
            },
        );
    }
    Ok(entries.into_values().collect())
}
