//! Logging configuration for dual output (console + file) with rotation
//!
//! Console output is human-readable; files carry structured JSON so per-symbol lookup
//! fields (symbol, slot, lookback) can be filtered after the fact.

use serde::Deserialize;
use tracing_appender::non_blocking;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

const LOG_FILE_PREFIX: &str = "rvol_engine";

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory to store log files
    pub log_dir: String,
    /// Log level filter (e.g., "info", "debug", "rvol_engine=debug")
    pub level_filter: String,
    pub rotation: LogRotation,
    /// Whether to include timestamps in console output
    pub console_timestamps: bool,
    /// Whether to use JSON format for file logs (structured)
    pub file_json_format: bool,
    /// Days to keep rotated log files
    pub cleanup_days: u32,
}

/// Log rotation configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    /// Rotate when file reaches size limit (MB)
    SizeBased(u64),
}

impl LogRotation {
    /// Parses "daily", "hourly" or "size:<MB>"; anything else is daily
    pub fn parse(value: &str) -> Self {
        match value {
            "hourly" => LogRotation::Hourly,
            "daily" => LogRotation::Daily,
            s if s.starts_with("size:") => {
                let size_mb = s.strip_prefix("size:").and_then(|v| v.parse().ok()).unwrap_or(100);
                LogRotation::SizeBased(size_mb)
            }
            _ => LogRotation::Daily,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            level_filter: "info,rvol_engine=info".to_string(),
            rotation: LogRotation::Daily,
            console_timestamps: true,
            file_json_format: true,
            cleanup_days: 30,
        }
    }
}

/// `[logging]` section of config.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingTomlConfig {
    pub log_dir: Option<String>,
    pub level_filter: Option<String>,
    pub rotation: Option<String>,
    pub console_timestamps: Option<bool>,
    pub file_json_format: Option<bool>,
    pub cleanup_days: Option<u32>,
}

impl From<LoggingTomlConfig> for LoggingConfig {
    fn from(toml: LoggingTomlConfig) -> Self {
        let defaults = LoggingConfig::default();
        Self {
            log_dir: toml.log_dir.unwrap_or(defaults.log_dir),
            level_filter: toml.level_filter.unwrap_or(defaults.level_filter),
            rotation: toml.rotation.as_deref().map(LogRotation::parse).unwrap_or(defaults.rotation),
            console_timestamps: toml.console_timestamps.unwrap_or(defaults.console_timestamps),
            file_json_format: toml.file_json_format.unwrap_or(defaults.file_json_format),
            cleanup_days: toml.cleanup_days.unwrap_or(defaults.cleanup_days),
        }
    }
}

/// Initialize dual output logging (console + rotating files)
///
/// Files land in `logs/rvol_engine.log.YYYY-MM-DD` (or hourly). The returned guard must be
/// kept alive for the life of the process so the background writer keeps flushing.
pub fn init_dual_logging(
    config: &LoggingConfig,
) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error + Send + Sync>> {
    std::fs::create_dir_all(&config.log_dir)?;

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level_filter));
    let file_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level_filter));

    let file_name = format!("{}.log", LOG_FILE_PREFIX);
    let file_appender = match config.rotation {
        LogRotation::Hourly => tracing_appender::rolling::hourly(&config.log_dir, &file_name),
        // tracing_appender has no size-based rotation
        LogRotation::Daily | LogRotation::SizeBased(_) => tracing_appender::rolling::daily(&config.log_dir, &file_name),
    };

    let (file_writer, guard) = non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_level(true)
        .with_target(true)
        .with_timer(if config.console_timestamps {
            ChronoUtc::new("%Y-%m-%d %H:%M:%S%.3f UTC".to_string())
        } else {
            ChronoUtc::new("".to_string())
        })
        .with_filter(console_filter);

    let file_layer = if config.file_json_format {
        fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_level(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_timer(ChronoUtc::new("%Y-%m-%dT%H:%M:%S%.3fZ".to_string()))
            .with_filter(file_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_level(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_timer(ChronoUtc::new("%Y-%m-%d %H:%M:%S%.3f UTC".to_string()))
            .with_filter(file_filter)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        log_dir = %config.log_dir,
        rotation = ?config.rotation,
        json_format = config.file_json_format,
        "📁 Dual logging initialized - console + rotating files"
    );

    Ok(guard)
}

/// Console-only fallback when the log directory is unusable
pub fn init_simple_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,rvol_engine=info")
        .try_init();
}

/// This crate's log files in `log_dir`, sorted by name
pub fn get_current_log_files(log_dir: &str) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(log_dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| {
                    path.is_file()
                        && path
                            .file_name()
                            .and_then(|name| name.to_str())
                            .map(|name| name.starts_with(LOG_FILE_PREFIX) && name.contains(".log"))
                            .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default();

    files.sort();
    files
}

/// Remove this crate's log files older than `keep_days`
pub fn cleanup_old_logs(log_dir: &str, keep_days: u32) -> Result<usize, std::io::Error> {
    let cutoff_time = std::time::SystemTime::now() - std::time::Duration::from_secs(keep_days as u64 * 24 * 3600);

    let mut removed_count = 0;
    for path in get_current_log_files(log_dir) {
        let modified = path.metadata().and_then(|metadata| metadata.modified());
        if let Ok(modified) = modified {
            if modified < cutoff_time && std::fs::remove_file(&path).is_ok() {
                removed_count += 1;
                tracing::debug!("🗑️ Removed old log file: {:?}", path);
            }
        }
    }

    if removed_count > 0 {
        tracing::info!("🧹 Cleaned up {} old log files (older than {} days)", removed_count, keep_days);
    }

    Ok(removed_count)
}

/// Log basic system information for debugging
pub fn log_system_info() {
    tracing::info!(
        package_version = env!("CARGO_PKG_VERSION"),
        target_arch = std::env::consts::ARCH,
        target_os = std::env::consts::OS,
        "📊 Environment information logged"
    );

    let cpu_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    tracing::info!(cpu_count, "🖥️ Hardware information logged");
}
