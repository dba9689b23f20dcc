//! # Logger
//!
//! A thin façade over `tracing`. A [`Logger`] owns a fully built
//! `tracing::Dispatch` (console layer, size-rotating file layer, level filter and a
//! zoned timestamp format) and exposes one leveled entry point for formatted
//! messages and one for key-value pairs. The server installs its logger as the
//! global default; jobs that should stay off the console build their own with
//! [`Logger::crontab`] and log through it directly.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{dispatcher, Dispatch, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use super::rotation::SizeRotatingFile;
use crate::configs::LoggerSettings;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unrecognized level: {0:?}")]
    InvalidLevel(String),

    #[error("unknown time zone: {0:?}")]
    InvalidTimeZone(String),

    #[error("cannot create log file {path}: {reason}")]
    FileSink { path: String, reason: String },

    #[error("a global logger is already installed: {0}")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// Maps a level name onto a `tracing::Level`.
///
/// Accepts the usual names plus `dpanic`, `panic` and `fatal`, which all map
/// to `ERROR`. An empty string means `INFO`.
pub fn parse_level(level: &str) -> Result<Level, LoggerError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "" | "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" | "dpanic" | "panic" | "fatal" => Ok(Level::ERROR),
        other => Err(LoggerError::InvalidLevel(other.to_string())),
    }
}

/// Timestamps rendered in a fixed zone, or UTC when none is configured.
#[derive(Debug, Clone, Copy)]
struct ZonedTime {
    tz: Option<Tz>,
}

impl ZonedTime {
    fn from_settings(settings: &LoggerSettings) -> Result<Self, LoggerError> {
        if !settings.local_time || settings.time_zone.is_empty() {
            return Ok(Self { tz: None });
        }
        let tz = settings
            .time_zone
            .parse::<Tz>()
            .map_err(|_| LoggerError::InvalidTimeZone(settings.time_zone.clone()))?;
        Ok(Self { tz: Some(tz) })
    }
}

impl FormatTime for ZonedTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = Utc::now();
        match self.tz {
            Some(tz) => write!(w, "{}", now.with_timezone(&tz).format(TIME_FORMAT)),
            None => write!(w, "{}", now.format(TIME_FORMAT)),
        }
    }
}

/// # Logger
///
/// Cloneable handle to a configured `tracing` dispatcher. Keep at least one
/// clone alive for as long as file output is needed: the background writer
/// flushes when the last clone is dropped.
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
    _file_guard: Option<Arc<WorkerGuard>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("file_output", &self._file_guard.is_some())
            .finish()
    }
}

impl Logger {
    /// Builds a logger from its settings.
    ///
    /// # Errors
    /// Returns `LoggerError` for an unknown level or zone, or when the log
    /// file directory cannot be prepared.
    pub fn new(settings: &LoggerSettings) -> Result<Self, LoggerError> {
        let level = parse_level(&settings.level)?;
        let timer = ZonedTime::from_settings(settings)?;

        let console = settings.output_console.then(|| {
            tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
        });

        let (file, guard) = if settings.output_file {
            let (writer, guard) = tracing_appender::non_blocking(SizeRotatingFile::open(settings)?);
            let layer = tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_writer(writer);
            (Some(layer), Some(Arc::new(guard)))
        } else {
            (None, None)
        };

        let subscriber = tracing_subscriber::registry()
            .with(LevelFilter::from_level(level))
            .with(console)
            .with(file);

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            _file_guard: guard,
        })
    }

    /// Logger for scheduled jobs: same settings, console output off.
    pub fn crontab(settings: &LoggerSettings) -> Result<Self, LoggerError> {
        Self::new(&settings.without_console())
    }

    /// Installs this logger as the process-wide default, bridging `log`
    /// records (sqlx, redis) into it as well.
    pub fn install_global(&self) -> Result<(), LoggerError> {
        self.dispatch.clone().try_init()?;
        Ok(())
    }

    /// The underlying dispatcher.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Runs `f` with this logger as the thread's default.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }

    /// Emits a formatted message at `level`.
    pub fn log(&self, level: Level, message: fmt::Arguments<'_>) {
        self.in_scope(|| match level {
            Level::ERROR => tracing::error!("{}", message),
            Level::WARN => tracing::warn!("{}", message),
            Level::INFO => tracing::info!("{}", message),
            Level::DEBUG => tracing::debug!("{}", message),
            _ => tracing::trace!("{}", message),
        });
    }

    /// Emits `message` at `level` with key-value pairs attached.
    pub fn log_kv(&self, level: Level, message: &str, fields: &[(&str, &dyn fmt::Display)]) {
        let rendered = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        self.in_scope(|| match level {
            Level::ERROR => tracing::error!(fields = %rendered, "{}", message),
            Level::WARN => tracing::warn!(fields = %rendered, "{}", message),
            Level::INFO => tracing::info!(fields = %rendered, "{}", message),
            Level::DEBUG => tracing::debug!(fields = %rendered, "{}", message),
            _ => tracing::trace!(fields = %rendered, "{}", message),
        });
    }
}
