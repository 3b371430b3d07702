// Shared helpers for integration tests.
//
// Provides a temporary repository, destination and external cache, plus a
// fluent builder so each integration test can lay out a source tree without
// repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use dotrender::commands::CommandSetup;
use dotrender::external::{ExternalCache, FetchOptions, HttpFetcher};
use dotrender::logging::{Log, TaskStatus};
use dotrender::plan::Plan;
use dotrender::platform::{Os, Platform};

/// [`Log`] implementation that keeps every line for later assertions.
#[derive(Debug, Default)]
pub struct CapturingLog {
    lines: Mutex<Vec<String>>,
}

impl CapturingLog {
    fn push(&self, level: &str, msg: &str) {
        self.lines
            .lock()
            .expect("log mutex")
            .push(format!("{level}: {msg}"));
    }

    /// Whether any captured line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .expect("log mutex")
            .iter()
            .any(|l| l.contains(needle))
    }
}

impl Log for CapturingLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push("dry-run", msg);
    }
    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        self.push("task", &format!("{name} {status:?} {}", message.unwrap_or("")));
    }
}

/// An isolated repository, destination and cache, each a
/// [`tempfile::TempDir`] removed on drop.
pub struct TestRepo {
    pub root: tempfile::TempDir,
    pub destination: tempfile::TempDir,
    pub cache: tempfile::TempDir,
    pub os: Os,
}

impl TestRepo {
    /// Create an empty repository with `conf/` and `home/` directories.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create root");
        std::fs::create_dir_all(root.path().join("conf")).expect("create conf");
        std::fs::create_dir_all(root.path().join("home")).expect("create home");
        Self {
            root,
            destination: tempfile::tempdir().expect("create destination"),
            cache: tempfile::tempdir().expect("create cache"),
            os: Os::Linux,
        }
    }

    /// Write `conf/config.toml`.
    pub fn config(self, content: &str) -> Self {
        std::fs::write(self.root.path().join("conf/config.toml"), content)
            .expect("write config.toml");
        self
    }

    /// Write `conf/externals.toml`.
    pub fn externals(self, content: &str) -> Self {
        std::fs::write(self.root.path().join("conf/externals.toml"), content)
            .expect("write externals.toml");
        self
    }

    /// Write a source file under `home/`, creating parents.
    pub fn source(self, relative: &str, content: &str) -> Self {
        let path = self.root.path().join("home").join(relative);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create parents");
        std::fs::write(path, content).expect("write source");
        self
    }

    /// Render for macOS instead of Linux.
    pub fn on(mut self, os: Os) -> Self {
        self.os = os;
        self
    }

    /// Destination path of `relative`.
    pub fn target(&self, relative: &str) -> PathBuf {
        self.destination.path().join(relative)
    }

    /// Read a destination file.
    pub fn read_target(&self, relative: &str) -> String {
        std::fs::read_to_string(self.target(relative)).expect("read target")
    }

    /// Load configuration the way every command does.
    pub fn setup(&self, log: &dyn Log) -> anyhow::Result<CommandSetup> {
        let platform = Platform::new(
            self.os,
            false,
            "ws1.example.org",
            self.destination.path().to_path_buf(),
        );
        CommandSetup::load(
            self.root.path().to_path_buf(),
            self.destination.path().to_path_buf(),
            platform,
            log,
        )
    }

    /// Build the plan with the real fetcher and this repo's cache.
    pub fn plan(&self, log: &dyn Log, refresh: bool) -> anyhow::Result<Plan> {
        let cache = ExternalCache::new(self.cache.path());
        let opts = FetchOptions {
            refresh,
            parallel: true,
            now: Utc::now(),
        };
        self.setup(log)?
            .plan_with(&HttpFetcher, Some(&cache), &opts, log)
    }

    /// Every file and directory under the destination, relative and sorted.
    pub fn destination_listing(&self) -> Vec<String> {
        let mut out = Vec::new();
        walk(self.destination.path(), self.destination.path(), &mut out);
        out.sort();
        out
    }
}

fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
    for entry in std::fs::read_dir(dir).expect("read dir") {
        let path = entry.expect("dir entry").path();
        let relative = path
            .strip_prefix(base)
            .expect("under base")
            .display()
            .to_string();
        if path.is_dir() {
            out.push(format!("{relative}/"));
            walk(base, &path, out);
        } else {
            out.push(relative);
        }
    }
}

/// Build a gzip-compressed tar archive from `(path, content)` pairs and
/// return a `file://` URL to it. Paths ending in `/` become directories.
pub fn tar_gz_url(dir: &Path, name: &str, entries: &[(&str, &str)]) -> String {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).expect("create archive");
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (entry_path, content) in entries {
        let mut header = tar::Header::new_gnu();
        if entry_path.ends_with('/') {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            header.set_cksum();
            builder
                .append_data(&mut header, entry_path, std::io::empty())
                .expect("append dir");
        } else {
            header.set_entry_type(tar::EntryType::Regular);
            header.set_mode(if entry_path.ends_with(".sh") { 0o755 } else { 0o644 });
            header.set_size(content.len() as u64);
            header.set_cksum();
            builder
                .append_data(&mut header, entry_path, content.as_bytes())
                .expect("append file");
        }
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip");
    format!("file://{}", path.display())
}
