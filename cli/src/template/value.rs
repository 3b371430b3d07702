//! Values visible to templates.
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A template value: a scalar or a nested map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean flag.
    Bool(bool),
    /// Integer literal or data value.
    Int(i64),
    /// String (including colour values).
    Str(String),
    /// Nested namespace such as `.palette`.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Go template truthiness: `false`, `0`, `""` and empty maps are false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Str(s) => !s.is_empty(),
            Self::Map(m) => !m.is_empty(),
        }
    }

    /// Render a scalar as text; maps have no textual form.
    ///
    /// # Errors
    ///
    /// Returns a message when the value is a map.
    pub fn to_text(&self) -> Result<String, String> {
        match self {
            Self::Map(_) => Err("cannot print a map value".to_string()),
            scalar => Ok(scalar.to_string()),
        }
    }

    /// Short type name used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "string",
            Self::Map(_) => "map",
        }
    }

    /// Convert a TOML value from configuration.
    ///
    /// Floats and datetimes become strings; arrays are rejected.
    ///
    /// # Errors
    ///
    /// Returns a message naming the unsupported value type.
    pub fn from_toml(value: toml::Value) -> Result<Self, String> {
        match value {
            toml::Value::String(s) => Ok(Self::Str(s)),
            toml::Value::Integer(i) => Ok(Self::Int(i)),
            toml::Value::Boolean(b) => Ok(Self::Bool(b)),
            toml::Value::Float(f) => Ok(Self::Str(f.to_string())),
            toml::Value::Datetime(d) => Ok(Self::Str(d.to_string())),
            toml::Value::Array(_) => Err("arrays are not supported as template values".to_string()),
            toml::Value::Table(t) => t
                .into_iter()
                .map(|(k, v)| Self::from_toml(v).map(|v| (k, v)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Self::Map),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
            Self::Map(m) => {
                let keys: Vec<&str> = m.keys().map(String::as_str).collect();
                write!(f, "map[{}]", keys.join(" "))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unreachable)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_go_rules() {
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::Map(BTreeMap::new()).is_truthy());
        assert!(Value::Str("x".into()).is_truthy());
        assert!(Value::Int(-1).is_truthy());
    }

    #[test]
    fn map_has_no_text_form() {
        assert!(Value::Map(BTreeMap::new()).to_text().is_err());
        assert_eq!(Value::Bool(true).to_text().unwrap(), "true");
    }

    #[test]
    fn from_toml_converts_nested_tables() {
        let parsed: toml::Value = toml::from_str("a = 1\n[t]\nb = \"x\"\n").unwrap();
        let value = Value::from_toml(parsed).unwrap();
        let Value::Map(root) = value else {
            unreachable!("top-level TOML is a table")
        };
        assert_eq!(root.get("a"), Some(&Value::Int(1)));
        assert!(matches!(root.get("t"), Some(Value::Map(_))));
    }

    #[test]
    fn from_toml_rejects_arrays() {
        let parsed: toml::Value = toml::from_str("a = [1, 2]").unwrap();
        let toml::Value::Table(t) = parsed else {
            unreachable!("top-level TOML is a table")
        };
        let a = t.get("a").cloned().unwrap();
        assert!(Value::from_toml(a).is_err());
    }

    #[test]
    fn serializes_untagged() {
        let v = Value::Map(BTreeMap::from([
            ("flag".to_string(), Value::Bool(true)),
            ("name".to_string(), Value::Str("n".into())),
        ]));
        assert_eq!(
            serde_json::to_string(&v).unwrap(),
            r#"{"flag":true,"name":"n"}"#
        );
    }
}
