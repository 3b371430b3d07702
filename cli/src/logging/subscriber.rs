//! Console formatter and log-file layer.
use std::fmt;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::Mutex;

use tracing::field::{Field, Visit};

/// Environment variable overriding the console filter, in `EnvFilter` syntax.
const FILTER_ENV: &str = "DOTRENDER_LOG";

/// The fields [`Logger`](super::Logger) attaches to its events.
#[derive(Debug, Default)]
struct EventFields {
    message: String,
    kind: Option<String>,
    status: Option<String>,
}

impl EventFields {
    fn of(event: &tracing::Event<'_>) -> Self {
        let mut fields = Self::default();
        event.record(&mut fields);
        fields
    }
}

impl Visit for EventFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "kind" => self.kind = Some(value.to_string()),
            "status" => self.status = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

/// Appends every event to a per-command log file, without colour.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate `path`, write a run header and keep it open for appending.
    ///
    /// `None` when the file or its directory cannot be created.
    pub(super) fn create(path: &Path, command: &str) -> Option<Self> {
        fs::create_dir_all(path.parent()?).ok()?;
        let header = format!(
            "# dotrender {} {command} {}\n",
            crate::commands::version::version(),
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        );
        fs::write(path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let fields = EventFields::of(event);
        let ts = chrono::Utc::now().format("%H:%M:%S%.3f");
        let msg = &fields.message;
        let line = match (fields.kind.as_deref(), fields.status.as_deref()) {
            (Some("stage"), _) => format!("{ts} ==> {msg}"),
            (Some("dry_run"), _) => format!("{ts} [dry run] {msg}"),
            (Some("summary"), Some(status)) => format!("{ts} [{status}] {msg}"),
            _ => format!("{ts} {:<5} {msg}", event.metadata().level().as_str()),
        };
        if let Ok(mut file) = self.file.lock() {
            writeln!(file, "{line}").ok();
        }
    }
}

/// Human-oriented console output on stderr.
struct ConsoleFormatter;

impl ConsoleFormatter {
    const fn summary_icon(status: &str) -> (&'static str, &'static str) {
        match status.as_bytes() {
            b"ok" => ("✓", "\x1b[32m"),
            b"degraded" => ("!", "\x1b[33m"),
            b"dry-run" => ("~", "\x1b[37m"),
            b"failed" => ("✗", "\x1b[31m"),
            _ => ("○", "\x1b[2m"),
        }
    }
}

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let fields = EventFields::of(event);
        let msg = &fields.message;
        match (*event.metadata().level(), fields.kind.as_deref()) {
            (tracing::Level::ERROR, _) => writeln!(writer, "\x1b[31merror\x1b[0m {msg}"),
            (tracing::Level::WARN, _) => writeln!(writer, "\x1b[33mwarn\x1b[0m  {msg}"),
            (_, Some("stage")) => writeln!(writer, "\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m"),
            (_, Some("dry_run")) => writeln!(writer, "  \x1b[33m[dry run]\x1b[0m {msg}"),
            (_, Some("summary")) => {
                let (icon, color) = Self::summary_icon(fields.status.as_deref().unwrap_or(""));
                writeln!(writer, "  {color}{icon} {msg}\x1b[0m")
            }
            (tracing::Level::INFO, _) => writeln!(writer, "  {msg}"),
            _ => writeln!(writer, "  \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Install the global subscriber: console on stderr plus the log file for
/// `command`.
///
/// The console shows `info` and above, or `debug` with `verbose`;
/// `DOTRENDER_LOG` overrides both. The file always receives `debug`. Stdout
/// stays free for command output such as `diff` and `data`. Call once, before
/// any logging.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::{
        EnvFilter, Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let console_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var(FILTER_ENV)
        .from_env_lossy();

    let console = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let file = super::log_file_path(command)
        .and_then(|path| FileLayer::create(&path, command))
        .map(|layer| layer.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry().with(console).with(file).init();
}
