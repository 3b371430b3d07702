//! Registered path-segment prefix tokens and the template suffix.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Template suffix used when `[template] suffix` is not configured.
pub const DEFAULT_TEMPLATE_SUFFIX: &str = ".tmpl";

/// Built-in tokens, always registered before user-defined ones.
const DEFAULT_TOKENS: &[(&str, Attribute)] = &[
    ("dot_", Attribute::Hidden),
    ("executable_", Attribute::Executable),
    ("private_", Attribute::Private),
    ("readonly_", Attribute::ReadOnly),
];

/// A filesystem attribute encoded by a prefix token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attribute {
    /// Target name gains a leading `.`.
    Hidden,
    /// Files gain execute bits.
    Executable,
    /// Group and other permission bits are cleared.
    Private,
    /// Write bits are cleared.
    ReadOnly,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hidden => "hidden",
            Self::Executable => "executable",
            Self::Private => "private",
            Self::ReadOnly => "readonly",
        })
    }
}

impl FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hidden" => Ok(Self::Hidden),
            "executable" => Ok(Self::Executable),
            "private" => Ok(Self::Private),
            "readonly" => Ok(Self::ReadOnly),
            other => Err(other.to_string()),
        }
    }
}

/// Prefix tokens ordered longest first, plus the template suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixTable {
    tokens: Vec<(String, Attribute)>,
    suffix: String,
}

impl Default for PrefixTable {
    fn default() -> Self {
        let mut table = Self {
            tokens: Vec::new(),
            suffix: DEFAULT_TEMPLATE_SUFFIX.to_string(),
        };
        for (token, attribute) in DEFAULT_TOKENS {
            table.insert((*token).to_string(), *attribute);
        }
        table
    }
}

impl PrefixTable {
    /// Build the table from `[prefixes]` and `[template] suffix`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid tokens, unknown effects or an invalid
    /// suffix.
    pub fn from_config(
        entries: &BTreeMap<String, String>,
        suffix: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut table = Self::default();
        for (token, effect) in entries {
            let attribute = effect
                .parse::<Attribute>()
                .map_err(|effect| ConfigError::UnknownEffect {
                    token: token.clone(),
                    effect,
                })?;
            table.register(token, attribute)?;
        }
        if let Some(suffix) = suffix {
            table.set_suffix(suffix)?;
        }
        Ok(table)
    }

    /// Register a token, replacing any previous effect it had.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BadPrefixToken`] when the token is empty,
    /// contains `/` or starts with `.`.
    pub fn register(&mut self, token: &str, attribute: Attribute) -> Result<(), ConfigError> {
        let reason = if token.is_empty() {
            Some("token is empty")
        } else if token.contains('/') {
            Some("token contains '/'")
        } else if token.starts_with('.') {
            Some("token starts with '.'")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(ConfigError::BadPrefixToken {
                token: token.to_string(),
                reason: reason.to_string(),
            });
        }
        self.insert(token.to_string(), attribute);
        Ok(())
    }

    fn insert(&mut self, token: String, attribute: Attribute) {
        self.tokens.retain(|(existing, _)| *existing != token);
        self.tokens.push((token, attribute));
        self.tokens
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    }

    fn set_suffix(&mut self, suffix: &str) -> Result<(), ConfigError> {
        if suffix.is_empty() || suffix.contains('/') {
            return Err(ConfigError::InvalidSyntax {
                file: "config.toml".to_string(),
                message: format!("invalid template suffix {suffix:?}"),
            });
        }
        self.suffix = suffix.to_string();
        Ok(())
    }

    /// The longest registered token `segment` starts with.
    #[must_use]
    pub fn longest_match(&self, segment: &str) -> Option<(&str, Attribute)> {
        self.tokens
            .iter()
            .find(|(token, _)| segment.starts_with(token.as_str()))
            .map(|(token, attribute)| (token.as_str(), *attribute))
    }

    /// Template suffix marker.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Registered tokens, longest first.
    pub fn tokens(&self) -> impl Iterator<Item = (&str, Attribute)> {
        self.tokens.iter().map(|(t, a)| (t.as_str(), *a))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_registered() {
        let table = PrefixTable::default();
        assert_eq!(table.tokens().count(), 4);
        assert_eq!(table.suffix(), ".tmpl");
        assert_eq!(
            table.longest_match("dot_bashrc"),
            Some(("dot_", Attribute::Hidden))
        );
    }

    #[test]
    fn longest_token_wins() {
        let entries = BTreeMap::from([("dot_local_".to_string(), "private".to_string())]);
        let table = PrefixTable::from_config(&entries, None).unwrap();
        assert_eq!(
            table.longest_match("dot_local_share"),
            Some(("dot_local_", Attribute::Private))
        );
        assert_eq!(
            table.longest_match("dot_config"),
            Some(("dot_", Attribute::Hidden))
        );
    }

    #[test]
    fn custom_hidden_token() {
        let entries = BTreeMap::from([("hidden_".to_string(), "hidden".to_string())]);
        let table = PrefixTable::from_config(&entries, Some(".tpl")).unwrap();
        assert_eq!(
            table.longest_match("hidden_bashrc"),
            Some(("hidden_", Attribute::Hidden))
        );
        assert_eq!(table.suffix(), ".tpl");
    }

    #[test]
    fn re_registering_replaces_effect() {
        let entries = BTreeMap::from([("dot_".to_string(), "executable".to_string())]);
        let table = PrefixTable::from_config(&entries, None).unwrap();
        assert_eq!(table.tokens().count(), 4);
        assert_eq!(
            table.longest_match("dot_x"),
            Some(("dot_", Attribute::Executable))
        );
    }

    #[test]
    fn bad_tokens_are_rejected() {
        for token in ["", "a/b_", ".x_"] {
            let err = PrefixTable::default()
                .register(token, Attribute::Hidden)
                .unwrap_err();
            assert!(matches!(err, ConfigError::BadPrefixToken { .. }), "{token:?}");
        }
    }

    #[test]
    fn unknown_effect_is_rejected() {
        let entries = BTreeMap::from([("sym_".to_string(), "symlink".to_string())]);
        let err = PrefixTable::from_config(&entries, None).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEffect { effect, .. } if effect == "symlink"));
    }

    #[test]
    fn empty_suffix_is_rejected() {
        assert!(PrefixTable::from_config(&BTreeMap::new(), Some("")).is_err());
    }
}
