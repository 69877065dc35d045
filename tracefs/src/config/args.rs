use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracefs_core::LogLevel;

#[derive(Parser, Debug)]
#[command(name = "tracefs")]
#[command(about = "Inspect and drive the kernel tracing filesystem and its instances")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Log file path (default: ./tracefs.log)
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Enable logging to file (overrides config file)
    #[arg(long, action = clap::ArgAction::SetTrue, global = true)]
    pub log: bool,

    /// Disable logging completely (overrides config file)
    #[arg(long, action = clap::ArgAction::SetTrue, global = true, conflicts_with = "log")]
    pub no_log: bool,

    /// Enable console/stderr logging (overrides config file)
    #[arg(long, action = clap::ArgAction::SetTrue, global = true)]
    pub log_console: bool,

    /// Disable console logging, file logging only (overrides config file)
    #[arg(
        long,
        action = clap::ArgAction::SetTrue,
        global = true,
        conflicts_with = "log_console"
    )]
    pub no_log_console: bool,

    /// Set log level (none, error, warn, info, debug, trace)
    /// Also controls which diagnostics the library itself reports
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Specify custom configuration file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

/// Instance selector shared by the file-level subcommands
#[derive(clap::Args, Debug, Clone, Default, PartialEq)]
pub struct InstanceArg {
    /// Operate inside this named instance instead of the top-level directory
    #[arg(long, short = 'i', value_name = "NAME")]
    pub instance: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the tracing directory, mounting tracefs or debugfs if needed
    Root {
        /// Re-run discovery instead of using the cached result
        #[arg(long)]
        raw: bool,
    },
    /// List instance names
    Instances,
    /// Create an instance (or report an existing one)
    Create {
        name: String,
        /// Keep the directory when the command finishes
        #[arg(long)]
        keep: bool,
    },
    /// Remove an instance directory
    Remove { name: String },
    /// Print the contents of a tracing file
    Read {
        #[command(flatten)]
        instance: InstanceArg,
        file: String,
    },
    /// Write content to a tracing file
    Write {
        #[command(flatten)]
        instance: InstanceArg,
        /// Append instead of truncating
        #[arg(long)]
        append: bool,
        file: String,
        content: String,
    },
    /// Truncate a tracing file
    Clear {
        #[command(flatten)]
        instance: InstanceArg,
        file: String,
    },
    /// Print the selected trace clock
    Clock {
        #[command(flatten)]
        instance: InstanceArg,
    },
    /// Check whether a file (or directory with --dir) exists
    Exists {
        #[command(flatten)]
        instance: InstanceArg,
        #[arg(long)]
        dir: bool,
        name: String,
    },
    /// Write a message into the trace through trace_marker
    Marker {
        #[command(flatten)]
        instance: InstanceArg,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct ParsedArgs {
    pub command: Command,
    pub log_file: Option<PathBuf>,
    pub enable_logging: bool,
    pub enable_console_logging: bool,
    pub log_level: Option<LogLevel>,
    pub has_explicit_log_flag: bool, // Track if --log/--no-log was explicitly provided
    pub has_explicit_console_log_flag: bool, // Track if --log-console/--no-log-console was explicitly provided
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> ParsedArgs {
        Self::parse().into_parsed()
    }

    pub fn into_parsed(self) -> ParsedArgs {
        let (
            enable_logging,
            enable_console_logging,
            has_explicit_log_flag,
            has_explicit_console_log_flag,
        ) = Self::determine_logging_config(&self);

        ParsedArgs {
            command: self.command,
            log_file: self.log_file,
            enable_logging,
            enable_console_logging,
            log_level: self.log_level,
            has_explicit_log_flag,
            has_explicit_console_log_flag,
            config: self.config,
        }
    }

    /// Determine logging configuration from command line arguments
    fn determine_logging_config(parsed: &Args) -> (bool, bool, bool, bool) {
        let has_explicit_log_flag = parsed.log || parsed.no_log;
        let has_explicit_console_log_flag = parsed.log_console || parsed.no_log_console;

        // File logging is opt-in for a one-shot command
        let enable_logging = parsed.log && !parsed.no_log;

        // Console logging stays on unless explicitly disabled
        let enable_console_logging = !(parsed.no_log || parsed.no_log_console);

        (
            enable_logging,
            enable_console_logging,
            has_explicit_log_flag,
            has_explicit_console_log_flag,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> ParsedArgs {
        Args::try_parse_from(argv).unwrap().into_parsed()
    }

    #[test]
    fn test_read_with_instance() {
        let parsed = parse(&["tracefs", "read", "-i", "foo", "trace_clock"]);
        assert_eq!(
            parsed.command,
            Command::Read {
                instance: InstanceArg {
                    instance: Some("foo".to_string())
                },
                file: "trace_clock".to_string(),
            }
        );
        assert!(!parsed.enable_logging);
        assert!(parsed.enable_console_logging);
        assert!(!parsed.has_explicit_log_flag);
    }

    #[test]
    fn test_global_log_flags_after_subcommand() {
        let parsed = parse(&[
            "tracefs",
            "write",
            "--append",
            "set_event",
            "sched:sched_switch",
            "--log",
            "--no-log-console",
            "--log-level",
            "debug",
        ]);
        assert!(matches!(parsed.command, Command::Write { append: true, .. }));
        assert!(parsed.enable_logging);
        assert!(!parsed.enable_console_logging);
        assert!(parsed.has_explicit_log_flag);
        assert!(parsed.has_explicit_console_log_flag);
        assert_eq!(parsed.log_level, Some(LogLevel::Debug));
    }

    #[test]
    fn test_no_log_disables_console() {
        let parsed = parse(&["tracefs", "--no-log", "instances"]);
        assert!(!parsed.enable_logging);
        assert!(!parsed.enable_console_logging);
    }

    #[test]
    fn test_rejects_conflicting_and_invalid_flags() {
        assert!(Args::try_parse_from(["tracefs", "--log", "--no-log", "instances"]).is_err());
        assert!(Args::try_parse_from(["tracefs", "--log-level", "loud", "instances"]).is_err());
        assert!(Args::try_parse_from(["tracefs", "create"]).is_err());
    }

    #[test]
    fn test_create_keep_and_exists_dir() {
        assert_eq!(
            parse(&["tracefs", "create", "foo", "--keep"]).command,
            Command::Create {
                name: "foo".to_string(),
                keep: true
            }
        );
        assert!(matches!(
            parse(&["tracefs", "exists", "--dir", "events"]).command,
            Command::Exists { dir: true, .. }
        ));
    }
}
