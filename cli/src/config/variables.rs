//! Template variables declared in `conf/config.toml`.
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::platform::Platform;
use crate::template::{RenderContext, Value};

/// A flag that is true when the host matches any of its conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectRule {
    /// Case-insensitive suffixes of the fully-qualified host name.
    pub hostname_suffix: Vec<String>,
    /// Environment variables whose non-empty presence sets the flag.
    pub env: Vec<String>,
}

impl DetectRule {
    /// Evaluate the rule against a host name and an environment lookup.
    pub fn matches(&self, hostname: &str, env: impl Fn(&str) -> Option<String>) -> bool {
        let host = hostname.to_lowercase();
        self.hostname_suffix
            .iter()
            .any(|suffix| host.ends_with(&suffix.to_lowercase()))
            || self
                .env
                .iter()
                .any(|name| env(name).is_some_and(|v| !v.is_empty()))
    }
}

/// Flags, detection rules, palette and free-form data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    /// Static boolean flags.
    pub flags: BTreeMap<String, bool>,
    /// Flags computed from host introspection.
    pub detect: BTreeMap<String, DetectRule>,
    /// Named colour strings.
    pub palette: BTreeMap<String, String>,
    /// User data exposed as top-level variables.
    pub data: BTreeMap<String, Value>,
}

impl Variables {
    /// Convert the raw `[data]` table into template values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSyntax`] for values templates cannot hold.
    pub fn data_from_toml(table: toml::Table) -> Result<BTreeMap<String, Value>, ConfigError> {
        table
            .into_iter()
            .map(|(key, value)| {
                Value::from_toml(value)
                    .map(|v| (key.clone(), v))
                    .map_err(|message| ConfigError::InvalidSyntax {
                        file: "config.toml".to_string(),
                        message: format!("data.{key}: {message}"),
                    })
            })
            .collect()
    }

    /// Evaluate every detection rule.
    pub fn detected_flags(
        &self,
        hostname: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> BTreeMap<String, bool> {
        self.detect
            .iter()
            .map(|(name, rule)| (name.clone(), rule.matches(hostname, &env)))
            .collect()
    }

    /// Build the render context for `platform`, reading detection variables
    /// from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::VariableConflict`] when a name is defined twice.
    pub fn render_context(&self, platform: &Platform) -> Result<RenderContext, ConfigError> {
        self.render_context_with(platform, |name| std::env::var(name).ok())
    }

    /// Same as [`Self::render_context`] with an explicit environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::VariableConflict`] when a name is defined twice.
    pub fn render_context_with(
        &self,
        platform: &Platform,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<RenderContext, ConfigError> {
        let flags = platform
            .builtin_flags()
            .into_iter()
            .chain(self.flags.clone())
            .chain(self.detected_flags(&platform.hostname, env));
        RenderContext::new(platform, flags, self.palette.clone(), self.data.clone())
    }
}
