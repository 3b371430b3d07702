//! Apply planning: the complete, validated set of writes and removals.
//!
//! A [`Plan`] is built in one pass over the source tree and the resolved
//! externals. Building a plan never touches the destination except to list
//! exact external mounts, and any configuration or template problem aborts
//! before a single write happens.
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::prefixes::PrefixTable;
use crate::config::externals::ExternalKind;
use crate::error::{ConfigError, PlanError};
use crate::external::ResolvedExternal;
use crate::source::decode::{DIR_MODE, decode_path};
use crate::source::{EntryKind, SourceEntry};
use crate::template::{self, RenderContext};

/// What to do with one target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Ensure a directory exists with `mode`.
    Directory {
        /// Permission bits.
        mode: u32,
    },
    /// Ensure a file has exactly `content` and `mode`.
    File {
        /// Rendered content.
        content: Vec<u8>,
        /// Permission bits.
        mode: u32,
    },
    /// Remove the path (recursively for directories).
    Remove,
}

/// Which part of the configuration produced an entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    /// A source-tree entry, by source-relative path.
    Source(PathBuf),
    /// An external, by mount path.
    External(PathBuf),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(path) => write!(f, "source '{}'", path.display()),
            Self::External(mount) => write!(f, "external '{}'", mount.display()),
        }
    }
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    /// Path relative to the destination.
    pub target: PathBuf,
    /// What to do.
    pub action: Action,
    /// Where it came from.
    pub origin: Origin,
}

/// An ordered, validated list of plan entries for one destination.
#[derive(Debug, Clone)]
pub struct Plan {
    destination: PathBuf,
    entries: Vec<PlanEntry>,
}

impl Plan {
    /// Destination directory all targets are relative to.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Entries in execution order.
    #[must_use]
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the plan has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Absolute path of an entry's target.
    #[must_use]
    pub fn absolute(&self, entry: &PlanEntry) -> PathBuf {
        self.destination.join(&entry.target)
    }
}

/// Everything a plan is built from.
#[derive(Debug, Clone, Copy)]
pub struct PlanInputs<'a> {
    /// Scanned source tree.
    pub sources: &'a [SourceEntry],
    /// Prefix tokens and template suffix.
    pub prefixes: &'a PrefixTable,
    /// Template variables.
    pub context: &'a RenderContext,
    /// Resolved externals.
    pub externals: &'a [ResolvedExternal],
    /// Directory targets are relative to.
    pub destination: &'a Path,
}

struct Claim {
    kind: EntryKind,
    origin: Origin,
    action: Action,
}

/// Pending source files, rendered after every path is validated.
struct PendingFile<'a> {
    target: PathBuf,
    source: &'a SourceEntry,
    is_template: bool,
    mode: u32,
}

/// Build and validate the plan.
///
/// # Errors
///
/// Returns [`PlanError::Config`] for undecodable paths and duplicate targets,
/// or [`PlanError::Templates`] listing every template that failed to render.
pub fn build_plan(inputs: &PlanInputs<'_>) -> Result<Plan, PlanError> {
    let mut claims: BTreeMap<PathBuf, Claim> = BTreeMap::new();
    let mut pending = Vec::new();

    for source in inputs.sources {
        let decoded = decode_path(&source.relative_path, source.kind, inputs.prefixes)?;
        let origin = Origin::Source(source.relative_path.clone());
        let mode = decoded.mode(source.kind);
        if let Some(existing) = claims.get(&decoded.target) {
            return Err(duplicate(&decoded.target, &existing.origin, &origin).into());
        }
        let action = match source.kind {
            EntryKind::Directory => Action::Directory { mode },
            EntryKind::File => {
                pending.push(PendingFile {
                    target: decoded.target.clone(),
                    source,
                    is_template: decoded.is_template,
                    mode,
                });
                // Content is filled in once every template has rendered.
                Action::File {
                    content: Vec::new(),
                    mode,
                }
            }
        };
        claims.insert(
            decoded.target,
            Claim {
                kind: source.kind,
                origin,
                action,
            },
        );
    }

    for external in inputs.externals.iter().filter(|e| e.is_available()) {
        claim_external(&mut claims, external)?;
    }
    check_exact_mounts(&claims, inputs.externals)?;
    check_file_ancestors(&claims)?;

    let mut errors = Vec::new();
    for file in pending {
        let name = file.source.relative_path.display().to_string();
        match template::render_entry(&name, &file.source.content, file.is_template, inputs.context) {
            Ok(content) => {
                if let Some(claim) = claims.get_mut(&file.target) {
                    claim.action = Action::File {
                        content,
                        mode: file.mode,
                    };
                }
            }
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        return Err(PlanError::Templates(errors));
    }

    // A stale path that is still claimed changed kind; it is removed right
    // before its replacement is written.
    let mut replaced: BTreeMap<PathBuf, Origin> = BTreeMap::new();
    let mut removals = Vec::new();
    for external in inputs.externals {
        for stale in external.stale_paths(inputs.destination)? {
            let origin = Origin::External(external.spec.mount.clone());
            if claims.contains_key(&stale) {
                replaced.insert(stale, origin);
                continue;
            }
            if claims.keys().any(|claimed| claimed.starts_with(&stale)) {
                continue;
            }
            removals.push(PlanEntry {
                target: stale,
                action: Action::Remove,
                origin,
            });
        }
    }
    removals.sort_by(|a, b| {
        b.target
            .components()
            .count()
            .cmp(&a.target.components().count())
            .then_with(|| b.target.cmp(&a.target))
    });

    let mut entries = Vec::with_capacity(claims.len() + replaced.len() + removals.len());
    for (target, claim) in claims {
        if let Some(origin) = replaced.remove(&target) {
            entries.push(PlanEntry {
                target: target.clone(),
                action: Action::Remove,
                origin,
            });
        }
        entries.push(PlanEntry {
            target,
            action: claim.action,
            origin: claim.origin,
        });
    }
    entries.extend(removals);

    Ok(Plan {
        destination: inputs.destination.to_path_buf(),
        entries,
    })
}

fn claim_external(
    claims: &mut BTreeMap<PathBuf, Claim>,
    external: &ResolvedExternal,
) -> Result<(), ConfigError> {
    let origin = Origin::External(external.spec.mount.clone());

    for entry in &external.entries {
        let action = match entry.kind {
            EntryKind::Directory => Action::Directory { mode: entry.mode },
            EntryKind::File => Action::File {
                content: entry.content.clone(),
                mode: entry.mode,
            },
        };
        insert_claim(claims, &entry.target, entry.kind, &origin, action)?;
    }

    // The mount itself and every directory above it. A file external's mount
    // is the file.
    let skip = usize::from(external.spec.kind == ExternalKind::File);
    let implied = external
        .spec
        .mount
        .ancestors()
        .skip(skip)
        .filter(|p| !p.as_os_str().is_empty());
    for dir in implied {
        insert_claim(
            claims,
            dir,
            EntryKind::Directory,
            &origin,
            Action::Directory { mode: DIR_MODE },
        )?;
    }
    Ok(())
}

/// Record a claim. Two directory claims on one path are compatible and the
/// first one wins; any other overlap is a duplicate.
fn insert_claim(
    claims: &mut BTreeMap<PathBuf, Claim>,
    target: &Path,
    kind: EntryKind,
    origin: &Origin,
    action: Action,
) -> Result<(), ConfigError> {
    match claims.get(target) {
        Some(existing) if existing.kind == EntryKind::Directory && kind == EntryKind::Directory => {
            Ok(())
        }
        Some(existing) => Err(duplicate(target, &existing.origin, origin)),
        None => {
            claims.insert(
                target.to_path_buf(),
                Claim {
                    kind,
                    origin: origin.clone(),
                    action,
                },
            );
            Ok(())
        }
    }
}

/// A source entry inside an exact mount would be removed on the next run.
fn check_exact_mounts(
    claims: &BTreeMap<PathBuf, Claim>,
    externals: &[ResolvedExternal],
) -> Result<(), ConfigError> {
    for external in externals.iter().filter(|e| e.spec.exact) {
        let mount = &external.spec.mount;
        let mount_origin = Origin::External(mount.clone());
        for (target, claim) in claims.range(mount.clone()..) {
            if !target.starts_with(mount) {
                break;
            }
            if target == mount || !matches!(claim.origin, Origin::Source(_)) {
                continue;
            }
            let provided_dir = claim.kind == EntryKind::Directory
                && external
                    .entries
                    .iter()
                    .any(|e| e.target == *target && e.kind == EntryKind::Directory);
            if !provided_dir {
                return Err(duplicate(target, &mount_origin, &claim.origin));
            }
        }
    }
    Ok(())
}

/// A path cannot be a file while something else lives beneath it.
fn check_file_ancestors(claims: &BTreeMap<PathBuf, Claim>) -> Result<(), ConfigError> {
    for (target, claim) in claims {
        for ancestor in target.ancestors().skip(1) {
            if let Some(parent) = claims.get(ancestor)
                && parent.kind == EntryKind::File
            {
                return Err(duplicate(ancestor, &parent.origin, &claim.origin));
            }
        }
    }
    Ok(())
}

fn duplicate(target: &Path, first: &Origin, second: &Origin) -> ConfigError {
    ConfigError::DuplicateTarget {
        target: target.display().to_string(),
        first: first.to_string(),
        second: second.to_string(),
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::config::externals::ExternalSpec;
    use crate::external::{ExternalEntry, Outcome};
    use crate::platform::{Os, Platform};
    use crate::template::Value;

    fn ctx(os: Os) -> RenderContext {
        let platform = Platform::new(os, false, "box", PathBuf::from("/home/u"));
        RenderContext::new(
            &platform,
            platform.builtin_flags(),
            BTreeMap::new(),
            BTreeMap::from([("email".to_string(), Value::Str("me@example.com".into()))]),
        )
        .unwrap()
    }

    fn table() -> PrefixTable {
        PrefixTable::from_config(
            &BTreeMap::from([("hidden_".to_string(), "hidden".to_string())]),
            None,
        )
        .unwrap()
    }

    fn file(path: &str, content: &str) -> SourceEntry {
        SourceEntry {
            relative_path: PathBuf::from(path),
            kind: EntryKind::File,
            content: content.as_bytes().to_vec(),
        }
    }

    fn dir(path: &str) -> SourceEntry {
        SourceEntry {
            relative_path: PathBuf::from(path),
            kind: EntryKind::Directory,
            content: Vec::new(),
        }
    }

    fn external(mount: &str, exact: bool, files: &[&str]) -> ResolvedExternal {
        ResolvedExternal {
            spec: ExternalSpec {
                mount: PathBuf::from(mount),
                kind: ExternalKind::Archive,
                url: "https://example.com/a.tar.gz".to_string(),
                include: Vec::new(),
                exclude: Vec::new(),
                strip_components: 0,
                exact,
                refresh_period: None,
            },
            outcome: Outcome::Fetched,
            entries: files
                .iter()
                .map(|f| ExternalEntry {
                    target: Path::new(mount).join(f),
                    kind: EntryKind::File,
                    mode: 0o644,
                    content: b"ext".to_vec(),
                })
                .collect(),
        }
    }

    fn plan(
        sources: &[SourceEntry],
        externals: &[ResolvedExternal],
        os: Os,
        destination: &Path,
    ) -> Result<Plan, PlanError> {
        build_plan(&PlanInputs {
            sources,
            prefixes: &table(),
            context: &ctx(os),
            externals,
            destination,
        })
    }

    fn targets(plan: &Plan) -> Vec<String> {
        plan.entries()
            .iter()
            .map(|e| e.target.display().to_string())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Rendering and ordering
    // -----------------------------------------------------------------------

    #[test]
    fn hidden_bashrc_scenario() {
        let sources = [file(
            "hidden_bashrc.tmpl",
            "{{ if .is_linux }}alias ls='ls --color=auto'{{ end }}\n",
        )];
        let linux = plan(&sources, &[], Os::Linux, Path::new("/home/u")).unwrap();
        assert_eq!(targets(&linux), vec![".bashrc"]);
        assert_eq!(
            linux.entries()[0].action,
            Action::File {
                content: b"alias ls='ls --color=auto'\n".to_vec(),
                mode: 0o644,
            }
        );
        assert_eq!(linux.absolute(&linux.entries()[0]), PathBuf::from("/home/u/.bashrc"));

        let mac = plan(&sources, &[], Os::Darwin, Path::new("/home/u")).unwrap();
        assert_eq!(
            mac.entries()[0].action,
            Action::File {
                content: b"\n".to_vec(),
                mode: 0o644,
            }
        );
    }

    #[test]
    fn directories_precede_contents() {
        let sources = [
            file("dot_config/nvim/init.lua", "x"),
            dir("dot_config"),
            dir("dot_config/nvim"),
            file("dot_bashrc", "y"),
        ];
        let p = plan(&sources, &[], Os::Linux, Path::new("/d")).unwrap();
        assert_eq!(
            targets(&p),
            vec![".bashrc", ".config", ".config/nvim", ".config/nvim/init.lua"]
        );
    }

    #[test]
    fn external_mount_dirs_are_implied() {
        let ext = external(".config/skills/skill-creator", false, &["SKILL.md"]);
        let p = plan(&[], &[ext], Os::Linux, Path::new("/d")).unwrap();
        assert_eq!(
            targets(&p),
            vec![
                ".config",
                ".config/skills",
                ".config/skills/skill-creator",
                ".config/skills/skill-creator/SKILL.md",
            ]
        );
        assert_eq!(p.entries()[0].action, Action::Directory { mode: 0o755 });
    }

    #[test]
    fn source_dir_may_share_external_parent() {
        let sources = [dir("private_dot_config")];
        let ext = external(".config/tool", false, &["a"]);
        let p = plan(&sources, &[ext], Os::Linux, Path::new("/d")).unwrap();
        assert_eq!(p.entries()[0].action, Action::Directory { mode: 0o700 });
        assert!(matches!(p.entries()[0].origin, Origin::Source(_)));
    }

    #[test]
    fn unavailable_external_contributes_nothing() {
        let mut ext = external(".config/tool", true, &[]);
        ext.outcome = Outcome::Unavailable;
        let p = plan(&[], &[ext], Os::Linux, Path::new("/d")).unwrap();
        assert!(p.is_empty());
    }

    #[test]
    fn exact_removals_come_last_deepest_first() {
        let dest = tempfile::tempdir().expect("tempdir");
        let mount = dest.path().join("m");
        std::fs::create_dir_all(mount.join("sub")).unwrap();
        std::fs::write(mount.join("keep"), "old").unwrap();
        std::fs::write(mount.join("gone"), "old").unwrap();
        std::fs::write(mount.join("sub/gone"), "old").unwrap();

        let mut ext = external("m", true, &["keep", "sub/new"]);
        ext.entries.insert(
            1,
            ExternalEntry {
                target: PathBuf::from("m/sub"),
                kind: EntryKind::Directory,
                mode: 0o755,
                content: Vec::new(),
            },
        );
        let p = plan(&[file("a", "x")], &[ext], Os::Linux, dest.path()).unwrap();
        assert_eq!(
            targets(&p),
            vec!["a", "m", "m/keep", "m/sub", "m/sub/new", "m/sub/gone", "m/gone"]
        );
        assert_eq!(p.entries()[6].action, Action::Remove);
    }

    #[test]
    fn kind_change_is_removed_before_replacement() {
        let dest = tempfile::tempdir().expect("tempdir");
        let mount = dest.path().join("m");
        std::fs::create_dir_all(&mount).unwrap();
        std::fs::write(mount.join("sub"), "was a file").unwrap();

        let mut ext = external("m", true, &["sub/new"]);
        ext.entries.insert(
            0,
            ExternalEntry {
                target: PathBuf::from("m/sub"),
                kind: EntryKind::Directory,
                mode: 0o755,
                content: Vec::new(),
            },
        );
        let p = plan(&[], &[ext], Os::Linux, dest.path()).unwrap();
        assert_eq!(targets(&p), vec!["m", "m/sub", "m/sub", "m/sub/new"]);
        assert_eq!(p.entries()[1].action, Action::Remove);
        assert_eq!(p.entries()[2].action, Action::Directory { mode: 0o755 });
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn two_sources_for_one_target() {
        let sources = [file("dot_bashrc", "a"), file("hidden_bashrc.tmpl", "b")];
        let err = plan(&sources, &[], Os::Linux, Path::new("/d")).unwrap_err();
        assert!(
            matches!(&err, PlanError::Config(ConfigError::DuplicateTarget { target, .. }) if target == ".bashrc"),
            "{err}"
        );
    }

    #[test]
    fn source_and_external_file_collide() {
        let sources = [dir("bin"), file("bin/tool", "src")];
        let err = plan(&sources, &[external("bin", false, &["tool"])], Os::Linux, Path::new("/d"))
            .unwrap_err();
        assert!(err.to_string().contains("external 'bin'"), "{err}");
    }

    #[test]
    fn source_file_inside_exact_mount() {
        let sources = [
            dir("dot_config"),
            dir("dot_config/skills"),
            file("dot_config/skills/notes.md", "mine"),
        ];
        let ext = external(".config/skills", true, &["SKILL.md"]);
        let err = plan(&sources, &[ext], Os::Linux, Path::new("/d")).unwrap_err();
        assert!(
            matches!(err, PlanError::Config(ConfigError::DuplicateTarget { ref target, .. }) if target == ".config/skills/notes.md"),
            "{err}"
        );
    }

    #[test]
    fn source_file_inside_non_exact_mount_is_fine() {
        let sources = [
            dir("dot_config"),
            dir("dot_config/skills"),
            file("dot_config/skills/notes.md", "mine"),
        ];
        let ext = external(".config/skills", false, &["SKILL.md"]);
        assert!(plan(&sources, &[ext], Os::Linux, Path::new("/d")).is_ok());
    }

    #[test]
    fn file_cannot_contain_entries() {
        let ext = external("tool/bin", false, &["x"]);
        let err = plan(&[file("tool", "x")], &[ext], Os::Linux, Path::new("/d")).unwrap_err();
        assert!(err.to_string().contains("'tool'"), "{err}");
    }

    #[test]
    fn duplicates_are_found_before_rendering() {
        let sources = [
            file("dot_a", "x"),
            file("hidden_a", "y"),
            file("broken.tmpl", "{{ .nope }}"),
        ];
        let err = plan(&sources, &[], Os::Linux, Path::new("/d")).unwrap_err();
        assert!(matches!(err, PlanError::Config(_)), "{err}");
    }

    #[test]
    fn template_errors_are_batched() {
        let sources = [
            file("a.tmpl", "{{ .missing_a }}"),
            file("ok.tmpl", "{{ .email }}"),
            file("b.tmpl", "{{ if .is_linux }}"),
        ];
        let err = plan(&sources, &[], Os::Linux, Path::new("/d")).unwrap_err();
        let PlanError::Templates(errors) = err else {
            panic!("expected template errors");
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].template(), "a.tmpl");
        assert_eq!(errors[1].template(), "b.tmpl");
    }

    #[test]
    fn bad_source_name_aborts() {
        let err = plan(&[file("dot_", "x")], &[], Os::Linux, Path::new("/d")).unwrap_err();
        assert!(matches!(
            err,
            PlanError::Config(ConfigError::EmptyTargetName { .. })
        ));
    }
}
