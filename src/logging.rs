//! Logging setup for the engine binary and embedding applications.
//!
//! Events go to stderr unless a log directory is configured, in which case
//! they go to a daily rolling `{app_name}.log` there. `RUST_LOG` overrides
//! the configured level.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// The `[logging]` section of the engine configuration.
///
/// ```rust
/// use acton_engine::logging::{LoggingConfig, LogLevel};
///
/// let to_files = LoggingConfig::new()
///     .with_log_dir("/var/log/acton-engine")
///     .with_level(LogLevel::Debug);
/// assert!(to_files.log_dir.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Set to false to leave the global subscriber alone
    pub enabled: bool,
    /// Stem of the rolling log file name
    pub app_name: String,
    /// Rolling file directory; stderr when unset
    pub log_dir: Option<PathBuf>,
    /// Level used when `RUST_LOG` is not set
    pub level: LogLevel,
}

impl LoggingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration that installs nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Sends events to rolling files under `dir` instead of stderr.
    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: "acton-engine".to_string(),
            log_dir: None,
            level: LogLevel::Info,
        }
    }
}

/// Verbosity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The `EnvFilter` directive for this level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Keeps the background file writer alive; pending lines are flushed on drop.
pub struct LoggingGuard {
    _writer: Option<WorkerGuard>,
}

impl fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("file_output", &self._writer.is_some())
            .finish()
    }
}

/// Why logging could not be set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingError {
    pub kind: LoggingErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingErrorKind {
    /// The log directory could not be created
    LogDir { path: PathBuf, reason: String },
    /// Another global subscriber is already installed
    AlreadyInstalled { reason: String },
}

impl LoggingError {
    #[must_use]
    pub fn log_dir(path: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            kind: LoggingErrorKind::LogDir {
                path,
                reason: reason.into(),
            },
        }
    }

    #[must_use]
    pub fn already_installed(reason: impl Into<String>) -> Self {
        Self {
            kind: LoggingErrorKind::AlreadyInstalled {
                reason: reason.into(),
            },
        }
    }

    /// Returns true if a global subscriber was already in place.
    #[must_use]
    pub fn is_already_installed(&self) -> bool {
        matches!(self.kind, LoggingErrorKind::AlreadyInstalled { .. })
    }
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LoggingErrorKind::LogDir { path, reason } => write!(
                f,
                "cannot use log directory '{}': {reason}; pick a writable log_dir or unset it",
                path.display()
            ),
            LoggingErrorKind::AlreadyInstalled { reason } => write!(
                f,
                "cannot install the tracing subscriber: {reason}; set logging.enabled = false \
                 when the host application configures tracing itself"
            ),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Installs the global tracing subscriber described by `config`.
///
/// Returns `Ok(None)` when logging is disabled. Hold the returned guard for
/// as long as events should be written.
///
/// # Errors
///
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<LoggingGuard>, LoggingError> {
    if !config.enabled {
        return Ok(None);
    }

    let (writer, guard, ansi) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|e| LoggingError::log_dir(dir.clone(), e.to_string()))?;
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", config.app_name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(writer), Some(guard), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), None, true),
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(false),
        )
        .try_init()
        .map_err(|e| LoggingError::already_installed(e.to_string()))?;

    Ok(Some(LoggingGuard { _writer: guard }))
}
