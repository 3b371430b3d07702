//! External archive declarations from `conf/externals.toml`.
//!
//! Keys follow chezmoi's `.chezmoiexternal.toml` so existing declarations can
//! be reused unchanged:
//!
//! ```toml
//! [".config/skills/skill-creator"]
//! type = "archive"
//! url = "https://github.com/o/r/archive/refs/heads/main.tar.gz"
//! exact = true
//! stripComponents = 3
//! refreshPeriod = "168h"
//! include = ["*/skills/skill-creator/**"]
//! ```
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use super::toml_loader::load_config;
use crate::error::ConfigError;

/// How the downloaded bytes become target content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalKind {
    /// A tar or tar.gz archive expanded under the mount path.
    Archive,
    /// A single file written to the mount path.
    File,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawExternal {
    #[serde(rename = "type")]
    kind: ExternalKind,
    url: String,
    #[serde(default)]
    exact: bool,
    #[serde(default)]
    strip_components: usize,
    refresh_period: Option<String>,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
}

/// A validated external declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSpec {
    /// Target-relative mount path.
    pub mount: PathBuf,
    /// Archive or single file.
    pub kind: ExternalKind,
    /// `http(s)://` or `file://` URL.
    pub url: String,
    /// Globs matched against raw archive paths; empty keeps everything.
    pub include: Vec<String>,
    /// Globs removing entries that matched `include`.
    pub exclude: Vec<String>,
    /// Leading path components dropped after filtering.
    pub strip_components: usize,
    /// Remove files under the mount that the archive no longer provides.
    pub exact: bool,
    /// Minimum age before re-fetching; `None` fetches only once.
    pub refresh_period: Option<Duration>,
}

impl ExternalSpec {
    fn from_raw(mount: &str, raw: RawExternal) -> Result<Self, ConfigError> {
        let malformed = |reason: String| ConfigError::MalformedExternal {
            mount: mount.to_string(),
            reason,
        };

        let path = Path::new(mount);
        if mount.is_empty()
            || !path
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(malformed(
                "mount path must be a relative path without '..'".to_string(),
            ));
        }
        if raw.url.trim().is_empty() {
            return Err(malformed("url is empty".to_string()));
        }

        let refresh_period = raw
            .refresh_period
            .as_deref()
            .map(humantime::parse_duration)
            .transpose()
            .map_err(|e| malformed(format!("invalid refreshPeriod: {e}")))?
            .filter(|d| !d.is_zero());

        Ok(Self {
            mount: path.to_path_buf(),
            kind: raw.kind,
            url: raw.url,
            include: raw.include,
            exclude: raw.exclude,
            strip_components: raw.strip_components,
            exact: raw.exact,
            refresh_period,
        })
    }
}

/// Load every external from `path`, ordered by mount path.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed or a declaration is invalid.
pub fn load(path: &Path) -> Result<Vec<ExternalSpec>, ConfigError> {
    let raw: BTreeMap<String, RawExternal> = load_config(path)?;
    raw.into_iter()
        .map(|(mount, spec)| ExternalSpec::from_raw(&mount, spec))
        .collect()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn load_str(content: &str) -> Result<Vec<ExternalSpec>, ConfigError> {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("externals.toml");
        std::fs::write(&path, content).expect("write");
        load(&path)
    }

    #[test]
    fn parses_chezmoi_keys() {
        let specs = load_str(
            r#"
[".config/skills/skill-creator"]
type = "archive"
url = "https://example.com/main.tar.gz"
exact = true
stripComponents = 3
refreshPeriod = "168h"
include = ["*/skills/skill-creator/**"]
exclude = ["**/*.bak"]
"#,
        )
        .unwrap();
        assert_eq!(specs.len(), 1);
        let spec = &specs[0];
        assert_eq!(spec.mount, PathBuf::from(".config/skills/skill-creator"));
        assert_eq!(spec.kind, ExternalKind::Archive);
        assert!(spec.exact);
        assert_eq!(spec.strip_components, 3);
        assert_eq!(spec.refresh_period, Some(Duration::from_secs(168 * 3600)));
        assert_eq!(spec.exclude, vec!["**/*.bak".to_string()]);
    }

    #[test]
    fn defaults_apply() {
        let specs = load_str("[\"bin/tool\"]\ntype = \"file\"\nurl = \"file:///tmp/tool\"\n").unwrap();
        let spec = &specs[0];
        assert_eq!(spec.kind, ExternalKind::File);
        assert!(!spec.exact);
        assert_eq!(spec.strip_components, 0);
        assert!(spec.refresh_period.is_none());
        assert!(spec.include.is_empty());
    }

    #[test]
    fn zero_refresh_period_means_once() {
        let specs =
            load_str("[\"a\"]\ntype = \"file\"\nurl = \"file:///x\"\nrefreshPeriod = \"0s\"\n")
                .unwrap();
        assert!(specs[0].refresh_period.is_none());
    }

    #[test]
    fn missing_file_has_no_externals() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load(&dir.path().join("externals.toml")).unwrap().is_empty());
    }

    #[test]
    fn escaping_mount_is_malformed() {
        let err = load_str("[\"../outside\"]\ntype = \"file\"\nurl = \"file:///x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedExternal { .. }), "{err}");
        let err = load_str("[\"/abs\"]\ntype = \"file\"\nurl = \"file:///x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedExternal { .. }), "{err}");
    }

    #[test]
    fn bad_duration_is_malformed() {
        let err = load_str("[\"a\"]\ntype = \"file\"\nurl = \"file:///x\"\nrefreshPeriod = \"soon\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("refreshPeriod"), "{err}");
    }

    #[test]
    fn unknown_keys_are_syntax_errors() {
        let err = load_str("[\"a\"]\ntype = \"git-repo\"\nurl = \"file:///x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSyntax { .. }), "{err}");
    }
}
