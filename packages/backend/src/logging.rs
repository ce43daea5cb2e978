use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_DIR: &str = "./logs";
const LOG_FILE_PREFIX: &str = "pathway.log";

/// Keeps the non-blocking file writer flushing until dropped.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    /// Daily-rolling file output directory; `None` logs to stdout only
    pub file_dir: Option<PathBuf>,
}

impl LogSettings {
    pub fn from_env(level: &str) -> Self {
        Self::resolve(
            level,
            crate::config::env_bool("ENABLE_FILE_LOGS"),
            crate::config::env_string("LOG_DIR"),
        )
    }

    fn resolve(level: &str, file_logs: Option<bool>, log_dir: Option<String>) -> Self {
        let file_dir = file_logs
            .unwrap_or(false)
            .then(|| PathBuf::from(log_dir.unwrap_or_else(|| DEFAULT_LOG_DIR.to_string())));
        Self {
            level: level.to_string(),
            file_dir,
        }
    }
}

pub fn init_tracing(log_level: &str) -> Option<FileLogGuard> {
    init_with(&LogSettings::from_env(log_level))
}

pub fn init_with(settings: &LogSettings) -> Option<FileLogGuard> {
    let env_filter =
        EnvFilter::try_new(&settings.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match settings.file_dir.as_deref().map(open_file_writer) {
        Some(Ok((writer, guard))) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(FileLogGuard { _guard: guard }))
        }
        Some(Err(err)) => {
            eprintln!("file logging disabled: {err}");
            (None, None)
        }
        None => (None, None),
    };

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .try_init();
    if let Err(err) = result {
        eprintln!("tracing already initialised: {err}");
    }

    guard
}

fn open_file_writer(
    dir: &std::path::Path,
) -> std::io::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logs_off_by_default() {
        let settings = LogSettings::resolve("debug", None, Some("/tmp/x".into()));
        assert_eq!(settings.file_dir, None);
        assert_eq!(settings.level, "debug");
    }

    #[test]
    fn test_file_logs_default_dir() {
        let settings = LogSettings::resolve("info", Some(true), None);
        assert_eq!(settings.file_dir, Some(PathBuf::from("./logs")));
    }
}
