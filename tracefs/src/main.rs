mod cli;
mod config;
mod logging;

use std::process::ExitCode;
use tracing::error;

/// `exists` ran but found nothing
const EXIT_MISSING: u8 = 1;
/// Any failure: config, logging setup or the command itself
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    let parsed_args = config::Args::parse_args();

    let config = match &parsed_args.config {
        Some(path) => config::Config::load_with_explicit_path(path),
        None => config::Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tracefs: {e:#}");
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let merged = config::MergedConfig::new(parsed_args, config);

    if let Err(e) = logging::initialize_logging(
        &merged.log_file,
        merged.enable_logging,
        merged.enable_console_logging,
        merged.log_level,
    ) {
        eprintln!("tracefs: Failed to initialize logging: {e}");
        return ExitCode::from(EXIT_ERROR);
    }

    match cli::run(&merged) {
        Ok(cli::Outcome::Success) => ExitCode::SUCCESS,
        Ok(cli::Outcome::Missing) => ExitCode::from(EXIT_MISSING),
        Err(e) => {
            // stderr always carries the error; the log file gets a copy when the
            // console layer is not already echoing it there
            eprintln!("tracefs: {e:#}");
            if !merged.enable_console_logging {
                error!("{e:#}");
            }
            ExitCode::from(EXIT_ERROR)
        }
    }
}
