//! Error types for the tracefs library

use std::io;
use std::path::PathBuf;

/// Errors surfaced by tracing directory discovery and instance file access
#[derive(Debug, thiserror::Error)]
pub enum TracefsError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Can't open {path} for read: {source}")]
    MountTableUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No tracing filesystem available (tracefs not mounted and mounting failed)")]
    NoTracingFilesystemAvailable,

    #[error("File {path} not found")]
    FileNotFound { path: PathBuf },

    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to allocate {requested} bytes of file buffer for {path}")]
    AllocationFailure { path: PathBuf, requested: usize },

    #[error("Partial write to {path}: {written} of {expected} bytes")]
    PartialWrite {
        path: PathBuf,
        written: usize,
        expected: usize,
    },

    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid instance name: {0:?}")]
    InvalidInstanceName(String),

    #[error("Failed to create instance directory {path}: {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove instance directory {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot remove top instance")]
    TopLevelInstance,

    #[error("Option bit {0} is out of range for a 64-bit options mask")]
    InvalidOptionBit(u32),

    #[error("No number found in {path}")]
    InvalidNumber { path: PathBuf },

    #[error("No clock selected in {path}")]
    NoClockSelected { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, TracefsError>;
