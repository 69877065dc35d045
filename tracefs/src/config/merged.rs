use std::path::PathBuf;

use crate::config::{Command, Config, ParsedArgs};
use tracefs_core::{LogLevel, TracefsPaths};

/// Final merged configuration that combines command line arguments and config file settings
/// Command line arguments take priority over config file settings
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub command: Command,
    pub log_file: PathBuf,
    pub enable_logging: bool,
    pub enable_console_logging: bool,
    pub log_level: LogLevel,
    pub paths: TracefsPaths,
}

impl MergedConfig {
    /// Create merged configuration from parsed arguments and config file
    pub fn new(args: ParsedArgs, config: Config) -> Self {
        let log_file = args
            .log_file
            .unwrap_or_else(|| PathBuf::from(&config.general.log_file));

        let enable_logging = if args.has_explicit_log_flag {
            args.enable_logging
        } else {
            config.general.enable_logging
        };

        // --no-log silences everything, including the console
        let enable_console_logging = if args.has_explicit_console_log_flag
            || (args.has_explicit_log_flag && !args.enable_logging)
        {
            args.enable_console_logging
        } else {
            config.general.log_console
        };

        let log_level = args.log_level.unwrap_or(config.general.log_level);

        Self {
            command: args.command,
            log_file,
            enable_logging,
            enable_console_logging,
            log_level,
            paths: config.paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Args;
    use clap::Parser;
    use std::path::Path;

    fn parsed(argv: &[&str]) -> ParsedArgs {
        Args::try_parse_from(argv).unwrap().into_parsed()
    }

    #[test]
    fn test_config_file_used_without_flags() {
        let mut config = Config::default();
        config.general.enable_logging = true;
        config.general.log_console = false;
        config.general.log_level = LogLevel::Info;
        config.general.log_file = "/tmp/custom.log".to_string();
        config.paths.tracefs = PathBuf::from("/mnt/tracing");

        let merged = MergedConfig::new(parsed(&["tracefs", "instances"]), config);
        assert!(merged.enable_logging);
        assert!(!merged.enable_console_logging);
        assert_eq!(merged.log_level, LogLevel::Info);
        assert_eq!(merged.log_file, Path::new("/tmp/custom.log"));
        assert_eq!(merged.paths.tracefs, Path::new("/mnt/tracing"));
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut config = Config::default();
        config.general.enable_logging = true;
        config.general.log_level = LogLevel::Info;

        let merged = MergedConfig::new(
            parsed(&[
                "tracefs",
                "--no-log",
                "--log-level",
                "trace",
                "--log-file",
                "x.log",
                "root",
            ]),
            config,
        );
        assert!(!merged.enable_logging);
        assert!(!merged.enable_console_logging);
        assert_eq!(merged.log_level, LogLevel::Trace);
        assert_eq!(merged.log_file, Path::new("x.log"));
        assert_eq!(merged.command, Command::Root { raw: false });
    }
}
