//! Logging configuration
//!
//! The subscriber itself is installed by the binary; this module only holds
//! the serializable settings and the log-file housekeeping.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// Prefix of every log file name
pub const LOG_FILE_PREFIX: &str = "chromasync";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level name: trace, debug, info, warn, error or off
    pub level: String,
    /// Log to stderr
    pub console_output: bool,
    /// Log to a file in `log_dir`
    pub file_output: bool,
    /// Directory for log files
    pub log_dir: PathBuf,
    /// Log files kept by [`LogConfig::cleanup_old_logs`]
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: default_log_dir(),
            max_files: 10,
        }
    }
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("chromasync").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

impl LogConfig {
    /// Parsed level, `INFO` when the name is unknown
    pub fn parse_level(&self) -> LevelFilter {
        self.level.trim().parse().unwrap_or(LevelFilter::INFO)
    }

    /// Create `log_dir` if missing
    pub fn ensure_log_directory(&self) -> io::Result<()> {
        fs::create_dir_all(&self.log_dir)
    }

    /// Path of today's log file
    pub fn current_log_path(&self) -> PathBuf {
        let date = chrono::Local::now().format("%Y-%m-%d");
        self.log_dir.join(format!("{}_{}.log", LOG_FILE_PREFIX, date))
    }

    /// Delete the oldest log files beyond `max_files`. Returns how many were removed.
    pub fn cleanup_old_logs(&self) -> io::Result<usize> {
        if !self.log_dir.exists() {
            return Ok(0);
        }

        let mut logs: Vec<(PathBuf, std::time::SystemTime)> = fs::read_dir(&self.log_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.starts_with(LOG_FILE_PREFIX) && name.ends_with(".log")
            })
            .filter_map(|entry| {
                let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
                Some((entry.path(), modified))
            })
            .collect();

        if logs.len() <= self.max_files {
            return Ok(0);
        }

        // Newest first; same-time files fall back to name order
        logs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
        let mut removed = 0;
        for (path, _) in logs.into_iter().skip(self.max_files) {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        let mut config = LogConfig::default();
        assert_eq!(config.parse_level(), LevelFilter::INFO);
        config.level = "debug".to_string();
        assert_eq!(config.parse_level(), LevelFilter::DEBUG);
        config.level = "loud".to_string();
        assert_eq!(config.parse_level(), LevelFilter::INFO);
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            log_dir: dir.path().to_path_buf(),
            max_files: 2,
            ..LogConfig::default()
        };
        config.ensure_log_directory().unwrap();

        for day in 1..=4 {
            let path = dir.path().join(format!("chromasync_2026-01-0{}.log", day));
            fs::write(&path, "x").unwrap();
        }
        fs::write(dir.path().join("unrelated.txt"), "keep").unwrap();

        assert_eq!(config.cleanup_old_logs().unwrap(), 2);
        let remaining = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(remaining, 3);
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn test_missing_directory_is_not_an_error() {
        let config = LogConfig {
            log_dir: PathBuf::from("/nonexistent/chromasync-test-logs"),
            ..LogConfig::default()
        };
        assert_eq!(config.cleanup_old_logs().unwrap(), 0);
    }

    #[test]
    fn test_log_path_naming() {
        let config = LogConfig::default();
        let name = config.current_log_path();
        let name = name.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("chromasync_"));
        assert!(name.ends_with(".log"));
    }
}
