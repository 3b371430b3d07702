//! Domain-specific error types for the materializer.
//!
//! Internal modules return typed errors (e.g., [`ConfigError`],
//! [`TemplateError`]) while command handlers at the CLI boundary convert them
//! to [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! DotrenderError
//! ├── Config(ConfigError)    : TOML parsing, prefix tokens, duplicate targets
//! ├── Template(TemplateError): syntax, undefined variables, bad calls
//! ├── Fetch(FetchError)      : unreachable archives, bad archive data
//! ├── Plan(PlanError)        : batched validation failures
//! ├── Apply(ApplyError)      : filesystem failures mid-apply
//! └── Platform(PlatformError): host introspection failures
//! ```

use thiserror::Error;

use crate::processing::ApplyReport;

/// Top-level error type for the materializer.
#[derive(Error, Debug)]
pub enum DotrenderError {
    /// Configuration-related error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// External archive fetch error.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Plan validation error.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Plan execution error.
    #[error("Apply error: {0}")]
    Apply(#[from] ApplyError),

    /// Platform detection error.
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

/// Errors that arise from configuration loading and source-tree decoding.
///
/// All variants are fatal and surface before any write.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An I/O error occurred while reading a config or source file.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A TOML file contains a syntax or type error.
    #[error("Invalid TOML in {file}: {message}")]
    InvalidSyntax {
        /// File that failed to parse.
        file: String,
        /// Parser message.
        message: String,
    },

    /// A registered prefix token cannot be used.
    #[error("Invalid prefix token '{token}': {reason}")]
    BadPrefixToken {
        /// The offending token.
        token: String,
        /// Why the token was rejected.
        reason: String,
    },

    /// A prefix token maps to an attribute effect that does not exist.
    #[error("Unknown attribute effect '{effect}' for prefix token '{token}'")]
    UnknownEffect {
        /// The prefix token.
        token: String,
        /// The unrecognised effect name.
        effect: String,
    },

    /// A source path segment is empty once prefixes and suffix are stripped.
    #[error("Source entry '{source_path}' decodes to an empty target name")]
    EmptyTargetName {
        /// Source-relative path of the entry.
        source_path: String,
    },

    /// Two entries decode to the same target path.
    #[error("Target '{target}' is claimed by both {first} and {second}")]
    DuplicateTarget {
        /// Target path claimed twice.
        target: String,
        /// Description of the first claimant.
        first: String,
        /// Description of the second claimant.
        second: String,
    },

    /// An external declaration is missing fields or has invalid values.
    #[error("Malformed external '{mount}': {reason}")]
    MalformedExternal {
        /// Mount path key of the external.
        mount: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A template variable name is defined by more than one source.
    #[error("Template variable '{0}' is defined more than once")]
    VariableConflict(String),
}

/// Errors that arise while parsing or evaluating a template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The template text cannot be parsed.
    #[error("{template}:{line}: syntax error: {message}")]
    Syntax {
        /// Template name (usually the source path).
        template: String,
        /// 1-based line number.
        line: usize,
        /// Parser message.
        message: String,
    },

    /// A field reference does not resolve in the render context.
    #[error("{template}:{line}: undefined variable '.{variable}'")]
    UndefinedVariable {
        /// Template name.
        template: String,
        /// 1-based line number.
        line: usize,
        /// Dotted variable path without the leading dot.
        variable: String,
    },

    /// A function call or value conversion failed.
    #[error("{template}:{line}: {message}")]
    Call {
        /// Template name.
        template: String,
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },
}

impl TemplateError {
    /// Name of the template the error belongs to.
    #[must_use]
    pub fn template(&self) -> &str {
        match self {
            Self::Syntax { template, .. }
            | Self::UndefinedVariable { template, .. }
            | Self::Call { template, .. } => template,
        }
    }
}

/// Errors that arise while fetching an external archive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The URL could not be reached or returned an error status.
    #[error("cannot reach {url}: {reason}")]
    Unreachable {
        /// Requested URL.
        url: String,
        /// Transport or status message.
        reason: String,
    },

    /// The URL scheme is not `http`, `https` or `file`.
    #[error("unsupported URL scheme in '{0}'")]
    UnsupportedScheme(String),

    /// The downloaded bytes are not a readable archive.
    #[error("invalid archive from {url}: {reason}")]
    Archive {
        /// Source URL.
        url: String,
        /// Decoder message.
        reason: String,
    },
}

impl FetchError {
    /// Whether retrying the same fetch later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

/// Errors that abort plan construction before any write.
#[derive(Error, Debug)]
pub enum PlanError {
    /// A configuration problem found while building the plan.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Every template error found across all source files.
    #[error("{} template error(s): {}", .0.len(), join_errors(.0))]
    Templates(Vec<TemplateError>),
}

fn join_errors(errors: &[TemplateError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that stop plan execution part-way through.
///
/// Already-written entries remain in place; the attached report lists
/// exactly which entries succeeded, which failed, and which were never tried.
#[derive(Error, Debug)]
pub enum ApplyError {
    /// A filesystem operation failed.
    #[error("failed to apply {path}: {reason} ({})", .report.summary())]
    Failed {
        /// Target path of the failing entry.
        path: String,
        /// Underlying error message.
        reason: String,
        /// Outcome of every entry up to and including the failure.
        report: ApplyReport,
    },

    /// The run was interrupted (Ctrl-C) between entries.
    #[error("interrupted ({})", .0.summary())]
    Interrupted(ApplyReport),
}

impl ApplyError {
    /// The execution report attached to this error.
    #[must_use]
    pub const fn report(&self) -> &ApplyReport {
        match self {
            Self::Failed { report, .. } | Self::Interrupted(report) => report,
        }
    }
}

/// Errors that arise from platform-specific operations.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The host operating system is not supported.
    #[error("Operation not supported on {platform}")]
    Unsupported {
        /// Name of the platform (e.g., `"windows"`).
        platform: String,
    },

    /// Platform detection failed (e.g., no home directory).
    #[error("Platform detection failed: {0}")]
    DetectionFailed(String),
}
