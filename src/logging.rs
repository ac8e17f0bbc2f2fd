//! Logging setup for HabitCoach using tracing.

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Logging;

/// Install the console and rolling-file layers described by `config`.
///
/// The returned guard flushes the file writer when dropped.
pub fn init(config: &Logging) -> Result<(WorkerGuard, PathBuf)> {
    let log_dir = log_dir(config)?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, &config.file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter(config))
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::info!(dir = %log_dir.display(), level = %config.level, "Logging initialized");
    Ok((guard, log_dir))
}

fn filter(config: &Logging) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|e| {
            eprintln!("Invalid log level '{}': {}, using info", config.level, e);
            EnvFilter::new("info")
        })
}

/// Configured log directory, or `logs/` under the platform data dir.
fn log_dir(config: &Logging) -> Result<PathBuf> {
    if let Some(dir) = &config.dir {
        return Ok(dir.clone());
    }
    let dirs = directories::ProjectDirs::from("com", "habitcoach", "habitcoach")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("logs"))
}

/// Initialize logging for tests (console only, no file). Safe to call repeatedly.
#[cfg(test)]
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_dir_wins() {
        let config = Logging {
            dir: Some(PathBuf::from("/var/log/habitcoach")),
            ..Logging::default()
        };
        assert_eq!(log_dir(&config).unwrap(), PathBuf::from("/var/log/habitcoach"));
    }

    #[test]
    fn test_default_dir_ends_in_logs() {
        if let Ok(dir) = log_dir(&Logging::default()) {
            assert!(dir.ends_with("logs"));
        }
    }
}
