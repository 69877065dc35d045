use anyhow::Result;
use std::path::Path;
use std::sync::OnceLock;
use tracefs_core::LogLevel;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

static INIT_GUARD: OnceLock<()> = OnceLock::new();

/// RUST_LOG wins when set, otherwise the configured level applies
fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(level.to_tracing_level_filter().into())
    })
}

pub fn initialize_logging(
    log_file_path: &Path,
    enable_file_logging: bool,
    enable_console_logging: bool,
    level: LogLevel,
) -> Result<()> {
    // The library gates its own diagnostics on this, independent of the subscriber
    tracefs_core::set_log_level(level);

    if INIT_GUARD.set(()).is_err() {
        // Already initialized elsewhere; do nothing and succeed
        return Ok(());
    }

    if !enable_file_logging && !enable_console_logging {
        return Ok(());
    }

    let mut open_error = None;
    let log_file = if enable_file_logging {
        match std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)
        {
            Ok(file) => Some(file),
            Err(e) => {
                open_error = Some(e);
                None
            }
        }
    } else {
        None
    };

    let file_layer = log_file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_writer(file)
            .with_target(true)
            .with_ansi(false)
            .with_filter(build_filter(level))
    });

    // Fall back to the console if the log file cannot be created.
    // Console output goes to stderr so command output on stdout stays clean.
    let console_layer = (enable_console_logging || open_error.is_some()).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(build_filter(level))
    });

    let init_res = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init();
    let _ = init_res; // ignore AlreadyInit errors silently

    if let Some(e) = open_error {
        tracing::warn!(
            "Could not open log file {}: {}; logging to stderr",
            log_file_path.display(),
            e
        );
    }

    Ok(())
}
