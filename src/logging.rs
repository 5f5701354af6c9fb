//! Diagnostics for the console tool.
//!
//! Report previews go to stdout, so log lines must never land there. They
//! go to stderr, or into a daily file under `FEIBRA_LOG_DIR` when that is
//! set. `RUST_LOG` picks the level, `info` by default.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

pub const LOG_DIR_VAR: &str = "FEIBRA_LOG_DIR";

// Flushes the file writer on exit; lives as long as the process.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Stderr,
    DailyFile(PathBuf),
}

impl LogSink {
    /// Blank or unset directory means stderr.
    pub fn from_dir(dir: Option<&str>) -> Self {
        match dir.map(str::trim) {
            Some(d) if !d.is_empty() => LogSink::DailyFile(PathBuf::from(d)),
            _ => LogSink::Stderr,
        }
    }

    pub fn from_env() -> Self {
        Self::from_dir(std::env::var(LOG_DIR_VAR).ok().as_deref())
    }
}

fn daily_file_writer(dir: &Path, app_name: &str) -> std::io::Result<BoxMakeWriter> {
    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::daily(dir, format!("{app_name}.log"));
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    Ok(BoxMakeWriter::new(writer))
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init_tracing_subscriber(app_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let sink = LogSink::from_env();
    let (writer, fallback) = match &sink {
        LogSink::Stderr => (BoxMakeWriter::new(std::io::stderr), None),
        LogSink::DailyFile(dir) => match daily_file_writer(dir, app_name) {
            Ok(w) => (w, None),
            Err(err) => (BoxMakeWriter::new(std::io::stderr), Some((dir.clone(), err))),
        },
    };

    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).try_init();
    if let Some((dir, err)) = fallback {
        tracing::warn!(dir = %dir.display(), %err, "log directory unusable, logging to stderr");
    }
    tracing::debug!(?sink, "logging initialized");
}
