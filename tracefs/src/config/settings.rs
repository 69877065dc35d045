use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracefs_core::{LogLevel, TracefsPaths};
use tracing::{debug, info};

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub paths: TracefsPaths,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// Default log file path (overridden by --log-file)
    #[serde(default = "default_log_file")]
    pub log_file: String,
    /// Enable/disable logging to file (overridden by --log/--no-log)
    #[serde(default)]
    pub enable_logging: bool,
    /// Also log to stderr (overridden by --log-console/--no-log-console)
    #[serde(default = "default_log_console")]
    pub log_console: bool,
    /// Log level filter for both the subscriber and the library (overridden by --log-level)
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_log_file() -> String {
    "tracefs.log".to_string()
}

fn default_log_console() -> bool {
    true
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            enable_logging: false,
            log_console: default_log_console(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load configuration from files with fallback search
    pub fn load() -> Result<Self> {
        for path in &Self::get_config_search_paths() {
            if path.exists() {
                info!("Loading configuration from: {}", path.display());
                return Self::load_from_file(path);
            } else {
                debug!("Configuration file not found: {}", path.display());
            }
        }

        info!("No configuration file found, using default settings");
        Ok(Self::default())
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read configuration file '{}': {}",
                path.display(),
                e
            )
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    fn parse(content: &str, file_path: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Self::create_friendly_toml_error(file_path, content, e))
    }

    /// Create a user-friendly error message for TOML parsing errors
    fn create_friendly_toml_error(
        file_path: &str,
        content: &str,
        error: toml::de::Error,
    ) -> anyhow::Error {
        let error_msg = format!("Configuration file parsing error in '{file_path}'");

        if let Some(span) = error.span() {
            let (line_num, col_num) = line_and_column(content, span.start);
            let context_line = content.lines().nth(line_num - 1).unwrap_or("");

            anyhow::anyhow!(
                "{}\n\nError at line {}, column {}:\n{}\n\n{}\n{}^\n\nSuggestion: {}",
                error_msg,
                line_num,
                col_num,
                error.message(),
                context_line,
                " ".repeat(col_num.saturating_sub(1)),
                Self::get_error_suggestion(&error.to_string())
            )
        } else {
            anyhow::anyhow!(
                "{}\n\n{}\n\nSuggestion: {}",
                error_msg,
                error,
                Self::get_error_suggestion(&error.to_string())
            )
        }
    }

    /// Provide helpful suggestions based on common configuration errors
    fn get_error_suggestion(error_msg: &str) -> &'static str {
        if error_msg.contains("log_level") || error_msg.contains("unknown variant") {
            "Valid log levels are: 'none', 'error', 'warn', 'info', 'debug', 'trace'"
        } else if error_msg.contains("unknown field") {
            "Check the field name spelling and ensure it's in the correct section ([general] or [paths])"
        } else if error_msg.contains("invalid type") {
            "Check the value type - strings should be in quotes, booleans are true/false"
        } else {
            "Please check the configuration file syntax"
        }
    }

    /// Get configuration file search paths in priority order
    fn get_config_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. ~/.tracefs/config.toml (user-level config)
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".tracefs").join("config.toml"));
        }

        // 2. ./tracefs.toml (project-level config)
        if let Ok(current_dir) = std::env::current_dir() {
            paths.push(current_dir.join("tracefs.toml"));
        }

        paths
    }

    /// Load configuration with explicit config file path (for --config flag)
    pub fn load_with_explicit_path<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Specified configuration file does not exist: {}",
                path.display()
            ));
        }
        Self::load_from_file(path)
    }
}

/// 1-based line and column of a byte offset
fn line_and_column(content: &str, offset: usize) -> (usize, usize) {
    let mut line_start = 0;
    let mut line_num = 1;
    for (i, b) in content.bytes().enumerate() {
        if i >= offset {
            break;
        }
        if b == b'\n' {
            line_num += 1;
            line_start = i + 1;
        }
    }
    (line_num, offset.saturating_sub(line_start) + 1)
}
