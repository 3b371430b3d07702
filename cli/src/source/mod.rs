//! The source tree: everything under `<root>/home/`.
pub mod decode;

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Whether a source entry is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

/// One entry of the source tree, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Path relative to the source directory.
    pub relative_path: PathBuf,
    /// File or directory.
    pub kind: EntryKind,
    /// Raw bytes of a file; empty for directories.
    pub content: Vec<u8>,
}

/// Read every managed entry under `source_dir`, parents before children.
///
/// Names starting with `.` (such as `.git`) are not managed and are skipped
/// along with everything below them. A missing source directory yields no
/// entries.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if a directory or file cannot be read.
pub fn scan(source_dir: &Path) -> Result<Vec<SourceEntry>, ConfigError> {
    let mut entries = Vec::new();
    if source_dir.is_dir() {
        walk(source_dir, Path::new(""), &mut entries)?;
    }
    Ok(entries)
}

fn walk(base: &Path, relative: &Path, out: &mut Vec<SourceEntry>) -> Result<(), ConfigError> {
    let dir = base.join(relative);
    let io_err = |path: &Path, source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut children = std::fs::read_dir(&dir)
        .map_err(|e| io_err(&dir, e))?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| io_err(&dir, e))?;
    children.sort();

    for name in children {
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        let rel = relative.join(&name);
        let path = base.join(&rel);
        // Follow symlinks so a linked file is managed by its content.
        let meta = std::fs::metadata(&path).map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            out.push(SourceEntry {
                relative_path: rel.clone(),
                kind: EntryKind::Directory,
                content: Vec::new(),
            });
            walk(base, &rel, out)?;
        } else {
            let content = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
            out.push(SourceEntry {
                relative_path: rel,
                kind: EntryKind::File,
                content,
            });
        }
    }
    Ok(())
}
