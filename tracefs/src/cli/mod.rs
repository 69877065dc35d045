//! CLI module - resolves the tracing directory and dispatches subcommands

pub mod commands;

use crate::config::{Command, MergedConfig};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracefs_core::{init_tracing_dir, Resolver};
use tracing::debug;

pub use commands::{execute, Outcome};

/// Run the configured subcommand against the system tracing directory
pub fn run(config: &MergedConfig) -> Result<Outcome> {
    let resolver = Resolver::new(config.paths.clone());

    let tracing_dir: PathBuf = match config.command {
        // Skip the process cache and report what discovery finds right now
        Command::Root { raw: true } => resolver.find_tracing_dir(),
        _ => init_tracing_dir(&resolver).map(|p| p.to_path_buf()),
    }
    .context("Failed to locate the tracing directory")?;
    debug!("Tracing directory: {}", tracing_dir.display());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&config.command, &tracing_dir, &mut out)
}
