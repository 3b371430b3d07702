//! Archive listing, filtering and component stripping.
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Component, Path};
use tar::{Archive, EntryType};

use super::glob;
use crate::error::FetchError;
use crate::source::EntryKind;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One regular file or directory from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// `/`-separated path without a leading `./` or trailing `/`.
    pub path: String,
    /// File or directory.
    pub kind: EntryKind,
    /// Permission bits normalised to 0644/0755 for files.
    pub mode: u32,
    /// File content; empty for directories.
    pub content: Vec<u8>,
}

/// List every file and directory in a tar or gzip-compressed tar archive.
///
/// Symlinks, hard links and metadata entries are skipped.
///
/// # Errors
///
/// Returns [`FetchError::Archive`] when the bytes are not a readable archive
/// or an entry path escapes the archive root.
pub fn read_entries(url: &str, bytes: &[u8]) -> Result<Vec<ArchiveEntry>, FetchError> {
    if bytes.starts_with(&GZIP_MAGIC) {
        list(url, Archive::new(GzDecoder::new(bytes)))
    } else {
        list(url, Archive::new(bytes))
    }
}

fn list<R: Read>(url: &str, mut archive: Archive<R>) -> Result<Vec<ArchiveEntry>, FetchError> {
    let bad = |reason: String| FetchError::Archive {
        url: url.to_string(),
        reason,
    };

    let mut out = Vec::new();
    for entry in archive.entries().map_err(|e| bad(e.to_string()))? {
        let mut entry = entry.map_err(|e| bad(e.to_string()))?;
        let kind = match entry.header().entry_type() {
            EntryType::Regular | EntryType::Continuous => EntryKind::File,
            EntryType::Directory => EntryKind::Directory,
            other => {
                tracing::debug!("skipping {other:?} entry in {url}");
                continue;
            }
        };

        let raw = entry.path().map_err(|e| bad(e.to_string()))?.into_owned();
        let Some(path) = normalize(&raw) else {
            return Err(bad(format!("entry escapes archive root: {}", raw.display())));
        };
        if path.is_empty() {
            continue;
        }

        let header_mode = entry.header().mode().unwrap_or(0o644);
        let mut content = Vec::new();
        let mode = match kind {
            EntryKind::Directory => 0o755,
            EntryKind::File => {
                entry
                    .read_to_end(&mut content)
                    .map_err(|e| bad(format!("reading {path}: {e}")))?;
                if header_mode & 0o111 == 0 { 0o644 } else { 0o755 }
            }
        };
        out.push(ArchiveEntry {
            path,
            kind,
            mode,
            content,
        });
    }
    Ok(out)
}

/// Join normal components with `/`; `None` for absolute or `..` paths.
fn normalize(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Drop the first `n` segments of `path`; `None` when nothing remains.
#[must_use]
pub fn strip_components(path: &str, n: usize) -> Option<String> {
    let rest: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).skip(n).collect();
    if rest.is_empty() {
        None
    } else {
        Some(rest.join("/"))
    }
}

/// Apply include and exclude globs to raw paths, then strip components.
#[must_use]
pub fn select(
    entries: Vec<ArchiveEntry>,
    include: &[String],
    exclude: &[String],
    strip: usize,
) -> Vec<ArchiveEntry> {
    entries
        .into_iter()
        .filter(|e| include.is_empty() || glob::matches_any(include, &e.path))
        .filter(|e| !glob::matches_any(exclude, &e.path))
        .filter_map(|e| {
            strip_components(&e.path, strip).map(|path| ArchiveEntry { path, ..e })
        })
        .collect()
}
