//! The immutable variable environment passed to every render call.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::value::Value;
use crate::error::ConfigError;
use crate::platform::{Os, Platform};

/// Names owned by the context itself; flags and data keys may not reuse them.
const RESERVED: &[&str] = &["os", "hostname", "home", "palette"];

/// Per-host template variables, built once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    os: Os,
    hostname: String,
    home: PathBuf,
    flags: BTreeMap<String, bool>,
    namespace: BTreeMap<String, Value>,
}

impl RenderContext {
    /// Assemble the context from host facts and configured variables.
    ///
    /// `flags` should already include the platform's built-in flags; a flag
    /// or data key that collides with another variable name is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::VariableConflict`] when a name is defined twice.
    pub fn new(
        platform: &Platform,
        flags: impl IntoIterator<Item = (String, bool)>,
        palette: BTreeMap<String, String>,
        data: BTreeMap<String, Value>,
    ) -> Result<Self, ConfigError> {
        let mut namespace = BTreeMap::from([
            ("os".to_string(), Value::Str(platform.os.to_string())),
            ("hostname".to_string(), Value::Str(platform.hostname.clone())),
            (
                "home".to_string(),
                Value::Str(platform.home.display().to_string()),
            ),
            (
                "palette".to_string(),
                Value::Map(
                    palette
                        .into_iter()
                        .map(|(k, v)| (k, Value::Str(v)))
                        .collect(),
                ),
            ),
        ]);

        let mut flag_map = BTreeMap::new();
        for (name, value) in flags {
            if flag_map.insert(name.clone(), value).is_some() {
                return Err(ConfigError::VariableConflict(name));
            }
            insert_unique(&mut namespace, name, Value::Bool(value))?;
        }
        for (name, value) in data {
            insert_unique(&mut namespace, name, value)?;
        }

        Ok(Self {
            os: platform.os,
            hostname: platform.hostname.clone(),
            home: platform.home.clone(),
            flags: flag_map,
            namespace,
        })
    }

    /// Operating system family.
    #[must_use]
    pub const fn os(&self) -> Os {
        self.os
    }

    /// Host name the context was built for.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Home directory of the invoking user.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Value of a flag, if defined.
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }

    /// Every top-level variable visible to templates.
    #[must_use]
    pub const fn namespace(&self) -> &BTreeMap<String, Value> {
        &self.namespace
    }

    /// Resolve a field path such as `["palette", "base"]`.
    #[must_use]
    pub fn lookup(&self, path: &[String]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.namespace.get(first)?;
        for segment in rest {
            match current {
                Value::Map(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }
}

fn insert_unique(
    namespace: &mut BTreeMap<String, Value>,
    name: String,
    value: Value,
) -> Result<(), ConfigError> {
    if RESERVED.contains(&name.as_str()) || namespace.contains_key(&name) {
        return Err(ConfigError::VariableConflict(name));
    }
    namespace.insert(name, value);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn linux() -> Platform {
        Platform::new(Os::Linux, false, "box", PathBuf::from("/home/u"))
    }

    #[test]
    fn namespace_holds_host_facts_and_flags() {
        let ctx = RenderContext::new(
            &linux(),
            linux().builtin_flags(),
            BTreeMap::from([("base".into(), "#1e1e2e".into())]),
            BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(ctx.lookup(&["os".into()]), Some(&Value::Str("linux".into())));
        assert_eq!(ctx.flag("is_linux"), Some(true));
        assert_eq!(
            ctx.lookup(&["palette".into(), "base".into()]),
            Some(&Value::Str("#1e1e2e".into()))
        );
        assert_eq!(ctx.home(), Path::new("/home/u"));
    }

    #[test]
    fn lookup_through_scalar_fails() {
        let ctx =
            RenderContext::new(&linux(), linux().builtin_flags(), BTreeMap::new(), BTreeMap::new())
                .unwrap();
        assert!(ctx.lookup(&["is_linux".into(), "x".into()]).is_none());
        assert!(ctx.lookup(&["missing".into()]).is_none());
    }

    #[test]
    fn duplicate_flag_conflicts() {
        let flags = linux()
            .builtin_flags()
            .into_iter()
            .chain([("is_linux".to_string(), false)]);
        let err = RenderContext::new(&linux(), flags, BTreeMap::new(), BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::VariableConflict(name) if name == "is_linux"));
    }

    #[test]
    fn data_key_cannot_shadow_reserved_or_flag() {
        for key in ["home", "is_wsl"] {
            let data = BTreeMap::from([(key.to_string(), Value::Str("x".into()))]);
            let err =
                RenderContext::new(&linux(), linux().builtin_flags(), BTreeMap::new(), data)
                    .unwrap_err();
            assert!(matches!(err, ConfigError::VariableConflict(ref name) if name == key));
        }
    }
}
