//! Logging initialization for the console.
//!
//! Every component logs through `tracing`. The subscriber installed here
//! writes structured JSONL to `<base>/logs/console.jsonl` and a compact
//! human-readable stream to stderr.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Append-only file writer shared by every log line.
#[derive(Clone)]
pub struct CentralLogWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl CentralLogWriter {
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl io::Write for CentralLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let result = guard.write(buf);
        // One flush per line keeps `tail -f` useful.
        guard.flush()?;
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

#[derive(Clone)]
struct WriterFactory {
    writer: CentralLogWriter,
}

impl<'a> MakeWriter<'a> for WriterFactory {
    type Writer = CentralLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer.clone()
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the logging system.
///
/// The filter is taken from `RUST_LOG` when set, otherwise from `level`.
/// When `log_file` cannot be opened, logging continues on stderr only.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_logging(level: &str, log_file: Option<&Path>) {
    let file_layer = log_file.and_then(|path| match CentralLogWriter::new(path) {
        Ok(writer) => Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_target(true)
                .with_writer(WriterFactory { writer })
                .with_filter(env_filter(level)),
        ),
        Err(err) => {
            eprintln!("failed to open log file {}: {}", path.display(), err);
            None
        }
    });

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_writer(io::stderr)
        .with_filter(env_filter(level));

    let installed = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            log_file = ?log_file.map(|p| p.display().to_string()),
            "logging initialized"
        );
    }
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::tempdir;

    #[test]
    fn parse_level_all_variants() {
        assert_eq!(parse_level("trace"), tracing::Level::TRACE);
        assert_eq!(parse_level("Debug"), tracing::Level::DEBUG);
        assert_eq!(parse_level("INFO"), tracing::Level::INFO);
        assert_eq!(parse_level("warning"), tracing::Level::WARN);
        assert_eq!(parse_level("error"), tracing::Level::ERROR);
    }

    #[test]
    fn parse_level_unknown_defaults_to_info() {
        assert_eq!(parse_level(""), tracing::Level::INFO);
        assert_eq!(parse_level("verbose"), tracing::Level::INFO);
    }

    #[test]
    fn central_log_writer_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("console.jsonl");

        let mut writer = CentralLogWriter::new(&path).unwrap();
        writer.write_all(b"first\n").unwrap();
        let mut second = writer.clone();
        second.write_all(b"second\n").unwrap();

        let mut content = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn init_logging_twice_does_not_panic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("console.jsonl");
        init_logging("debug", Some(&path));
        init_logging("info", None);
    }
}
