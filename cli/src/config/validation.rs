//! Warnings for configuration that loads but looks wrong.
use std::path::Path;

use super::externals::{ExternalKind, ExternalSpec};

/// A validation warning detected during configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The configuration source (e.g., "externals.toml").
    pub source: String,
    /// The specific item that triggered the warning.
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    /// Warning about `item` found by the `source` validator.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

/// Trait for configuration validators.
///
/// Validators report suspicious but loadable configuration. Anything that
/// makes a plan impossible is a [`crate::error::ConfigError`] instead.
pub trait ConfigValidator {
    /// Validate the configuration and return any warnings found.
    fn validate(&self, root: &Path) -> Vec<ValidationWarning>;

    /// Return a human-readable name for this validator.
    fn name(&self) -> &'static str;
}

/// Validator for external declarations.
#[derive(Debug)]
pub struct ExternalValidator<'a> {
    externals: &'a [ExternalSpec],
}

impl<'a> ExternalValidator<'a> {
    /// Validator over the declared externals.
    #[must_use]
    pub const fn new(externals: &'a [ExternalSpec]) -> Self {
        Self { externals }
    }
}

impl ConfigValidator for ExternalValidator<'_> {
    fn validate(&self, _root: &Path) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        for spec in self.externals {
            let item = spec.mount.display().to_string();

            // Include globs see the raw listing, which usually has a top-level
            // directory like `repo-main/`.
            if spec.kind == ExternalKind::Archive
                && !spec.include.is_empty()
                && !spec.include.iter().any(|glob| glob.starts_with('*'))
            {
                warnings.push(ValidationWarning::new(
                    "externals.toml",
                    &item,
                    "no include glob starts with '*' or '**'; patterns are matched before \
                     stripComponents and cannot match an archive with a top-level directory",
                ));
            }

            if spec.kind == ExternalKind::File
                && (!spec.include.is_empty()
                    || !spec.exclude.is_empty()
                    || spec.strip_components > 0)
            {
                warnings.push(ValidationWarning::new(
                    "externals.toml",
                    &item,
                    "include, exclude and stripComponents are ignored for file externals",
                ));
            }

            if !(spec.url.starts_with("http://")
                || spec.url.starts_with("https://")
                || spec.url.starts_with("file://"))
            {
                warnings.push(ValidationWarning::new(
                    "externals.toml",
                    &item,
                    format!("unsupported URL scheme: {}", spec.url),
                ));
            }
        }

        warnings
    }

    fn name(&self) -> &'static str {
        "externals"
    }
}

/// Validator for the source tree directory.
#[derive(Debug, Default)]
pub struct SourceDirValidator;

impl ConfigValidator for SourceDirValidator {
    fn validate(&self, root: &Path) -> Vec<ValidationWarning> {
        let source_dir = root.join(super::SOURCE_DIR);
        if source_dir.is_dir() {
            Vec::new()
        } else {
            vec![ValidationWarning::new(
                super::SOURCE_DIR,
                source_dir.display().to_string(),
                "source directory does not exist; only externals will be managed",
            )]
        }
    }

    fn name(&self) -> &'static str {
        "source"
    }
}

/// Validate all configuration and return collected warnings.
#[must_use]
pub fn validate_all(config: &super::Config) -> Vec<ValidationWarning> {
    let validators: Vec<Box<dyn ConfigValidator>> = vec![
        Box::new(SourceDirValidator),
        Box::new(ExternalValidator::new(&config.externals)),
    ];

    let mut all_warnings = Vec::new();
    for validator in validators {
        let warnings = validator.validate(&config.root);
        tracing::debug!(
            "validator {} reported {} warning(s)",
            validator.name(),
            warnings.len()
        );
        all_warnings.extend(warnings);
    }

    all_warnings
}
