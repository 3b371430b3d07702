//! Source path decoding.
//!
//! Each segment of a source-relative path has its registered prefix tokens
//! stripped repeatedly, longest match first, in any order. The remainder is
//! the literal target name; a hidden attribute prepends `.`. The template
//! suffix is only recognised on the final segment of a file.
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use super::EntryKind;
use crate::config::prefixes::{Attribute, PrefixTable};
use crate::error::ConfigError;

/// Default permission bits of a managed file.
pub const FILE_MODE: u32 = 0o644;

/// Default permission bits of a managed directory.
pub const DIR_MODE: u32 = 0o755;

/// A decoded source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPath {
    /// Target path relative to the destination directory.
    pub target: PathBuf,
    /// Attributes of the final segment.
    pub attributes: BTreeSet<Attribute>,
    /// The final segment carried the template suffix.
    pub is_template: bool,
}

impl DecodedPath {
    /// Permission bits for an entry of `kind` with these attributes.
    #[must_use]
    pub fn mode(&self, kind: EntryKind) -> u32 {
        mode_for(kind, &self.attributes)
    }
}

/// Compute permission bits from the default mode of `kind` and `attributes`.
#[must_use]
pub fn mode_for(kind: EntryKind, attributes: &BTreeSet<Attribute>) -> u32 {
    let mut mode = match kind {
        EntryKind::File => FILE_MODE,
        EntryKind::Directory => DIR_MODE,
    };
    if kind == EntryKind::File && attributes.contains(&Attribute::Executable) {
        mode |= 0o111;
    }
    if attributes.contains(&Attribute::Private) {
        mode &= 0o700;
    }
    if attributes.contains(&Attribute::ReadOnly) {
        mode &= !0o222;
    }
    mode
}

/// Strip every recognised prefix from one segment.
///
/// Returns the literal name (with `.` prepended when hidden) and the
/// accumulated attributes. Unknown prefixes are left in the name.
#[must_use]
pub fn decode_segment(segment: &str, table: &PrefixTable) -> (String, BTreeSet<Attribute>) {
    let mut attributes = BTreeSet::new();
    let mut rest = segment;
    while let Some((token, attribute)) = table.longest_match(rest) {
        attributes.insert(attribute);
        rest = rest.get(token.len()..).unwrap_or_default();
    }
    let name = if attributes.contains(&Attribute::Hidden) {
        format!(".{rest}")
    } else {
        rest.to_string()
    };
    (name, attributes)
}

/// Decode a source-relative path into its target path and attributes.
///
/// # Errors
///
/// Returns [`ConfigError::EmptyTargetName`] when a segment is empty after
/// stripping, or [`ConfigError::InvalidSyntax`] for paths that are not plain
/// relative UTF-8 paths.
pub fn decode_path(
    path: &Path,
    kind: EntryKind,
    table: &PrefixTable,
) -> Result<DecodedPath, ConfigError> {
    let display = path.display().to_string();
    let invalid = |message: &str| ConfigError::InvalidSyntax {
        file: display.clone(),
        message: message.to_string(),
    };

    let segments = path
        .components()
        .map(|component| match component {
            Component::Normal(s) => s.to_str().ok_or_else(|| invalid("path is not valid UTF-8")),
            _ => Err(invalid("source path must be relative and normalized")),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let Some((last, parents)) = segments.split_last() else {
        return Err(ConfigError::EmptyTargetName {
            source_path: display,
        });
    };

    let mut target = PathBuf::new();
    for segment in parents {
        let (name, _) = decode_segment(segment, table);
        if name.is_empty() {
            return Err(ConfigError::EmptyTargetName {
                source_path: display,
            });
        }
        target.push(name);
    }

    let (mut name, attributes) = decode_segment(last, table);
    let mut is_template = false;
    if kind == EntryKind::File
        && let Some(stripped) = name.strip_suffix(table.suffix())
    {
        name = stripped.to_string();
        is_template = true;
    }
    if name.is_empty() || name == "." {
        return Err(ConfigError::EmptyTargetName {
            source_path: display,
        });
    }
    target.push(name);

    Ok(DecodedPath {
        target,
        attributes,
        is_template,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn table() -> PrefixTable {
        PrefixTable::from_config(
            &BTreeMap::from([("hidden_".to_string(), "hidden".to_string())]),
            None,
        )
        .unwrap()
    }

    fn file(path: &str) -> DecodedPath {
        decode_path(Path::new(path), EntryKind::File, &table()).unwrap()
    }

    #[test]
    fn hidden_template_scenario() {
        let d = file("hidden_bashrc.tmpl");
        assert_eq!(d.target, PathBuf::from(".bashrc"));
        assert!(d.is_template);
        assert_eq!(d.attributes, BTreeSet::from([Attribute::Hidden]));
        assert_eq!(d.mode(EntryKind::File), 0o644);
    }

    #[test]
    fn plain_segment_passes_through() {
        let d = file("notes/todo.txt");
        assert_eq!(d.target, PathBuf::from("notes/todo.txt"));
        assert!(d.attributes.is_empty());
        assert!(!d.is_template);
    }

    #[test]
    fn prefixes_combine_in_any_order() {
        let a = file("dot_local/bin/executable_private_tool");
        let b = file("dot_local/bin/private_executable_tool");
        assert_eq!(a, b);
        assert_eq!(a.target, PathBuf::from(".local/bin/tool"));
        assert_eq!(a.mode(EntryKind::File), 0o700);
    }

    #[test]
    fn hidden_and_executable_combine() {
        let d = file("dot_executable_hook");
        assert_eq!(d.target, PathBuf::from(".hook"));
        assert_eq!(d.mode(EntryKind::File), 0o755);
    }

    #[test]
    fn readonly_clears_write_bits() {
        assert_eq!(file("readonly_ro").mode(EntryKind::File), 0o444);
        let dir = decode_path(Path::new("private_readonly_dot_ssh"), EntryKind::Directory, &table())
            .unwrap();
        assert_eq!(dir.target, PathBuf::from(".ssh"));
        assert_eq!(dir.mode(EntryKind::Directory), 0o500);
    }

    #[test]
    fn executable_does_not_affect_directories() {
        let dir =
            decode_path(Path::new("executable_bin"), EntryKind::Directory, &table()).unwrap();
        assert_eq!(dir.mode(EntryKind::Directory), 0o755);
    }

    #[test]
    fn suffix_only_on_files() {
        let dir = decode_path(Path::new("conf.tmpl"), EntryKind::Directory, &table()).unwrap();
        assert_eq!(dir.target, PathBuf::from("conf.tmpl"));
        assert!(!dir.is_template);
    }

    #[test]
    fn unknown_prefix_is_literal() {
        assert_eq!(file("symlink_x").target, PathBuf::from("symlink_x"));
    }

    #[test]
    fn empty_name_is_an_error() {
        for path in ["dot_", "executable_.tmpl", "private_/x"] {
            let err = decode_path(Path::new(path), EntryKind::File, &table()).unwrap_err();
            assert!(matches!(err, ConfigError::EmptyTargetName { .. }), "{path}: {err}");
        }
    }

    #[test]
    fn decoding_is_idempotent() {
        for path in [
            "hidden_bashrc.tmpl",
            "dot_config/private_executable_dot_x",
            "readonly_dot_dot_y",
            "plain",
            "dot_local/share/executable_readonly_run.sh",
        ] {
            let once = file(path);
            let twice = decode_path(&once.target, EntryKind::File, &table()).unwrap();
            assert!(twice.attributes.is_empty(), "{path} re-decoded with attributes");
            assert_eq!(twice.target, once.target, "{path}");
        }
    }
}
