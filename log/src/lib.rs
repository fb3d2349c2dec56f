//! # Logging Library
//!
//! Process-global, level-filtered logging with colored console output and an
//! optional plain-text log file. Install a logger once with [`set_logger`]
//! (or [`logger::AdvancedLogger::init`]) and use the macros everywhere else.
use colored::Colorize;
use std::fmt::Display;
use std::sync::{Arc, OnceLock};

/// Submodule containing the console/file logger implementation
pub mod logger;

static LOGGER: OnceLock<Arc<dyn Logger + Send + Sync>> = OnceLock::new();

/// Sets the global logger instance for the application
///
/// # Returns
///
/// * `Ok(())` if the logger was successfully set
/// * `Err(LogError::AlreadyInitialized)` if a logger has already been installed
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use log::logger::AdvancedLogger;
/// use log::{set_logger, LogLevel};
///
/// let logger = Arc::new(AdvancedLogger::new(LogLevel::Debug, None));
/// set_logger(logger).expect("Failed to initialize logger");
/// ```
pub fn set_logger(logger: Arc<dyn Logger + Send + Sync>) -> Result<(), LogError> {
    LOGGER
        .set(logger)
        .map_err(|_| LogError::AlreadyInitialized)
}

/// Retrieves the global logger, if one is set
pub fn logger() -> Option<Arc<dyn Logger + Send + Sync>> {
    LOGGER.get().cloned()
}

/// Changes the level of the global logger.
///
/// Returns `Err(LogError::NoLogger)` when nothing has been installed yet.
pub fn set_global_level(level: LogLevel) -> Result<(), LogError> {
    let logger = logger().ok_or(LogError::NoLogger)?;
    logger.set_level(level);
    Ok(())
}

/// Errors that can occur during logger operations
#[derive(Debug, PartialEq, Eq)]
pub enum LogError {
    /// Returned when attempting to initialize a logger after one has already been set
    AlreadyInitialized,
    /// Returned when attempting to use a logger before one has been set
    NoLogger,
}

impl Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogError::AlreadyInitialized => write!(f, "Logger has already been initialized"),
            LogError::NoLogger => write!(f, "No logger set"),
        }
    }
}

impl std::error::Error for LogError {}

/// Trait that all logger implementations must implement
pub trait Logger: Send + Sync {
    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }
    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }
    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
    fn critical(&self, message: &str) {
        self.log(LogLevel::Critical, message);
    }
    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }
    /// Logs a message with a specified log level
    fn log(&self, level: LogLevel, message: &str);
    /// Sets the minimum logging level that will be output
    fn set_level(&self, level: LogLevel);
    /// Current minimum level
    fn level(&self) -> LogLevel;
}

/// Logging levels in order of increasing severity.
///
/// `NoLog` is only meaningful as a logger threshold: it suppresses everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
    NoLog,
}

impl LogLevel {
    /// Returns the uncolored name of the level
    pub fn raw_str(&self) -> &'static str {
        match self {
            LogLevel::NoLog => "NOLOG",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    pub(crate) fn rank(self) -> u8 {
        match self {
            LogLevel::Debug => 0,
            LogLevel::Info => 1,
            LogLevel::Warning => 2,
            LogLevel::Error => 3,
            LogLevel::Critical => 4,
            LogLevel::NoLog => 5,
        }
    }

    pub(crate) fn from_rank(rank: u8) -> Self {
        match rank {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warning,
            3 => LogLevel::Error,
            4 => LogLevel::Critical,
            _ => LogLevel::NoLog,
        }
    }

    /// Whether a message at `level` passes a logger whose threshold is `self`.
    pub fn allows(self, level: LogLevel) -> bool {
        self != LogLevel::NoLog && level != LogLevel::NoLog && level.rank() >= self.rank()
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            "nolog" | "off" => Ok(LogLevel::NoLog),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

impl Display for LogLevel {
    /// Colored text for console output
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use LogLevel::*;
        let level_str = match self {
            NoLog => String::new(),
            Info => format!("{}", "INFO".blue().bold()),
            Warning => format!("{}", "WARNING".yellow().bold()),
            Error => format!("{}", "ERROR".red().bold()),
            Critical => format!("{}", "CRITICAL".bright_red().bold()),
            Debug => format!("{}", "DEBUG".cyan().bold()),
        };
        write!(f, "{level_str}")
    }
}

/// Logs a message with the specified log level
///
/// # Example
///
/// ```
/// use log::{log, LogLevel};
///
/// log!(LogLevel::Warning, "This is a {} message", "warning");
/// ```
#[macro_export]
macro_rules! log {
    ($level:expr, $($arg:tt)*) => {{
        if let Some(logger) = $crate::logger() {
            let message = format!($($arg)*);
            logger.log($level, &message);
        }
    }};
}

/// Logs a message at INFO level
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        $crate::log!($crate::LogLevel::Info, $($arg)*);
    }};
}

/// Logs a message at WARNING level
#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {{
        $crate::log!($crate::LogLevel::Warning, $($arg)*);
    }};
}

/// Logs a message at ERROR level
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        $crate::log!($crate::LogLevel::Error, $($arg)*);
    }};
}

/// Logs a message at CRITICAL level
#[macro_export]
macro_rules! critical {
    ($($arg:tt)*) => {{
        $crate::log!($crate::LogLevel::Critical, $($arg)*);
    }};
}

/// Logs a message at DEBUG level
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {{
        $crate::log!($crate::LogLevel::Debug, $($arg)*);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::AdvancedLogger;

    #[test]
    fn test_level_filtering() {
        assert!(LogLevel::Warning.allows(LogLevel::Error));
        assert!(LogLevel::Warning.allows(LogLevel::Warning));
        assert!(!LogLevel::Warning.allows(LogLevel::Info));
        assert!(!LogLevel::Warning.allows(LogLevel::Debug));
        assert!(LogLevel::Debug.allows(LogLevel::Critical));
    }

    #[test]
    fn test_nolog_suppresses_everything() {
        for level in [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warning,
            LogLevel::Error,
            LogLevel::Critical,
        ] {
            assert!(!LogLevel::NoLog.allows(level));
        }
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("DEBUG".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_macros_with_global_logger() {
        let _ = set_logger(Arc::new(AdvancedLogger::new(LogLevel::Debug, None)));
        set_global_level(LogLevel::Debug).unwrap();

        debug!("This is a debug message");
        info!("This is an info message");
        warning!("This is a warning message");
        error!("This is an error message");
        critical!("This is a critical message");
    }

    #[test]
    fn test_logger_init_once() {
        let _ = set_logger(Arc::new(AdvancedLogger::new(LogLevel::Debug, None)));

        let second = Arc::new(AdvancedLogger::new(LogLevel::Info, None));
        assert_eq!(set_logger(second), Err(LogError::AlreadyInitialized));
    }
}
