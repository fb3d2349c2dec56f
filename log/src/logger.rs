//
use crate::{LogError, LogLevel, Logger, set_logger};
use dirs::data_dir;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

pub struct AdvancedLogger {
    level: AtomicU8,
    log_file: Option<PathBuf>,
}

impl AdvancedLogger {
    /// Builds a logger. When `log_file` already exists it is archived first
    /// (renamed to a timestamp and compressed to `.7z`) and a fresh file is
    /// started. If the file cannot be created the logger stays console-only.
    pub fn new(level: LogLevel, log_file: Option<PathBuf>) -> Self {
        let log_file = log_file.and_then(|file| match prepare_log_file(&file) {
            Ok(()) => Some(file),
            Err(e) => {
                eprintln!("Failed to create log file {}: {e}", file.display());
                None
            }
        });

        AdvancedLogger {
            level: AtomicU8::new(level.rank()),
            log_file,
        }
    }

    /// Installs a global logger writing to `<data dir>/<app>/latest.log`.
    pub fn init(app: &str, log_level: LogLevel) -> Result<(), LogError> {
        let log_file = data_dir().map(|dir| dir.join(app).join("latest.log"));
        if log_file.is_none() {
            eprintln!("No user data directory available, logging to console only");
        }

        set_logger(Arc::new(AdvancedLogger::new(log_level, log_file)))
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

fn prepare_log_file(file: &Path) -> std::io::Result<()> {
    if file.exists() {
        archive_previous(file);
    }

    if let Some(parent) = file.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::File::create(file)?;
    Ok(())
}

/// Moves the previous session's log aside and compresses it. Failures here
/// only cost the old log, so they are reported and ignored.
fn archive_previous(file: &Path) {
    let mut renamed_path = file.to_path_buf();
    renamed_path.set_file_name(format!(
        "{}.log",
        chrono::Local::now().format("%d%m%Y_%H%M%S")
    ));

    if let Err(e) = std::fs::rename(file, &renamed_path) {
        eprintln!("Failed to rename existing log file: {e}");
        return;
    }

    let mut compressed_file = renamed_path.clone();
    compressed_file.set_extension("7z");

    match sevenz_rust2::compress_to_path(&renamed_path, &compressed_file) {
        Ok(()) => {
            std::fs::remove_file(&renamed_path).unwrap_or_else(|e| {
                eprintln!("Failed to remove old log file: {e}");
            });
        }
        Err(e) => eprintln!("Failed to compress file: {e}"),
    }
}

fn log_to_file(log_file: &Path, message: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(log_file)?;
    writeln!(file, "{message}")?;
    Ok(())
}

impl Logger for AdvancedLogger {
    fn set_level(&self, level: LogLevel) {
        self.level.store(level.rank(), Ordering::Relaxed);
    }

    fn level(&self) -> LogLevel {
        LogLevel::from_rank(self.level.load(Ordering::Relaxed))
    }

    fn log(&self, level: LogLevel, message: &str) {
        if !self.level().allows(level) {
            return;
        }

        let timestamp = chrono::Local::now().format("%d%m%Y %H:%M:%S");
        println!("{timestamp} - [{level}] - {message}");
        if let Some(ref file) = self.log_file {
            let write_msg = format!("{} - [{}] - {}", timestamp, level.raw_str(), message);
            log_to_file(file, &write_msg).unwrap_or_else(|e| {
                eprintln!("Failed to write to log file: {e}");
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_only_allowed_levels_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("latest.log");

        let logger = AdvancedLogger::new(LogLevel::Warning, Some(path.clone()));
        logger.info("hidden");
        logger.warning("shown");
        logger.error("also shown");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("hidden"));
        assert!(contents.contains("[WARNING] - shown"));
        assert!(contents.contains("[ERROR] - also shown"));
    }

    #[test]
    fn set_level_applies_to_later_messages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.log");

        let logger = AdvancedLogger::new(LogLevel::Error, Some(path.clone()));
        logger.debug("before");
        logger.set_level(LogLevel::Debug);
        assert_eq!(logger.level(), LogLevel::Debug);
        logger.debug("after");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("before"));
        assert!(contents.contains("after"));
    }

    #[test]
    fn existing_log_is_archived() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.log");
        std::fs::write(&path, "previous session\n").unwrap();

        let logger = AdvancedLogger::new(LogLevel::Info, Some(path.clone()));
        assert_eq!(logger.log_file(), Some(path.as_path()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        let archived = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.path().extension().is_some_and(|ext| ext == "7z"));
        assert!(archived);
    }

    #[test]
    fn unwritable_log_file_falls_back_to_console() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "").unwrap();

        let logger = AdvancedLogger::new(LogLevel::Info, Some(blocker.join("latest.log")));
        assert!(logger.log_file().is_none());
        logger.info("still works");
    }
}
