//! Persisted fetch records and the archive cache.
//!
//! Layout under the cache directory:
//!
//! ```text
//! externals/
//! ├── state.json          fetch records keyed by destination and mount
//! └── <sha256(key)>.bin   last successfully fetched bytes per external
//! ```
use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::externals::ExternalSpec;

/// When and from where an external was last fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRecord {
    /// URL the cached bytes came from.
    pub url: String,
    /// Completion time of the fetch.
    pub fetched_at: DateTime<Utc>,
    /// Hex SHA-256 of the cached bytes.
    pub sha256: String,
}

impl ExternalRecord {
    /// Whether `spec` needs a new download at `now`.
    ///
    /// A fetch is due when the URL changed or the refresh period elapsed.
    /// Externals without a refresh period are fetched once.
    #[must_use]
    pub fn is_stale(&self, spec: &ExternalSpec, now: DateTime<Utc>) -> bool {
        if self.url != spec.url {
            return true;
        }
        spec.refresh_period.is_some_and(|period| {
            let period = TimeDelta::from_std(period).unwrap_or(TimeDelta::MAX);
            now.signed_duration_since(self.fetched_at) >= period
        })
    }
}

/// All fetch records, keyed by [`record_key`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchState {
    /// Records by key.
    pub records: BTreeMap<String, ExternalRecord>,
}

/// Key identifying one external of one destination.
#[must_use]
pub fn record_key(destination: &Path, mount: &Path) -> String {
    format!("{}::{}", destination.display(), mount.display())
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(64);
    for b in &digest {
        // write! to a String is infallible; unwrap_or(()) makes that explicit.
        write!(hex, "{b:02x}").unwrap_or(());
    }
    hex
}

/// On-disk cache of fetch state and archive bytes.
#[derive(Debug, Clone)]
pub struct ExternalCache {
    dir: PathBuf,
}

impl ExternalCache {
    /// Cache rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache under the user cache directory, if one is available.
    #[must_use]
    pub fn default_location() -> Option<Self> {
        crate::logging::cache_dir().map(|dir| Self::new(dir.join("externals")))
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join("state.json")
    }

    fn archive_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", sha256_hex(key.as_bytes())))
    }

    /// Load fetch records. A missing or unreadable file yields empty state.
    #[must_use]
    pub fn load_state(&self) -> FetchState {
        let path = self.state_path();
        let Ok(content) = std::fs::read_to_string(&path) else {
            return FetchState::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("ignoring corrupt {}: {e}", path.display());
            FetchState::default()
        })
    }

    /// Persist fetch records.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory or file cannot be written.
    pub fn save_state(&self, state: &FetchState) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let json = serde_json::to_string_pretty(state).context("serializing fetch state")?;
        let path = self.state_path();
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))
    }

    /// Bytes of the last successful fetch for `key`.
    #[must_use]
    pub fn read_archive(&self, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.archive_path(key)).ok()
    }

    /// Store the bytes of a successful fetch for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory or file cannot be written.
    pub fn write_archive(&self, key: &str, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.archive_path(key);
        std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))
    }
}
