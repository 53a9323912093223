use std::fmt;
use std::path::Path;

use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Pipeline stage attached to every activity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Config,
    Generate,
    Send,
    Finish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Start => write!(f, "start"),
            Stage::Config => write!(f, "config"),
            Stage::Generate => write!(f, "generate"),
            Stage::Send => write!(f, "send"),
            Stage::Finish => write!(f, "finish"),
        }
    }
}

/// Keeps the non-blocking file writer alive. Dropping it flushes the log.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Open `path` for appending, creating its directory if needed.
fn open_appender(path: &Path) -> Result<RollingFileAppender, String> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("invalid log file name: {}", path.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir)
        .map_err(|e| e.to_string())
}

/// Install the global subscriber: stdout plus an append-only file at
/// `log_path`. If the file can't be opened, logging continues on stdout.
pub fn init(log_path: &Path) -> LogGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard, open_err) = match open_appender(log_path) {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    if let Some(e) = open_err {
        warn!(
            stage = %Stage::Start,
            "Could not open log file {}, logging to stdout only: {}",
            log_path.display(),
            e
        );
    }

    LogGuard { _file: guard }
}
