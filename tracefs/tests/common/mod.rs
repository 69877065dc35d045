#![allow(dead_code)]

//! Common test utilities shared across integration tests

pub mod runner;

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A fake tracing tree plus a mount table and config file pointing at it.
///
/// The mount table lists the tree as a mounted tracefs, so discovery never tries
/// to mount anything.
pub struct TracingFixture {
    dir: TempDir,
}

impl TracingFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path().join("tracing");
        fs::create_dir_all(root.join("instances")).expect("create instances dir");
        fs::write(root.join("trace_clock"), "[local] global counter\n").expect("write clock");
        fs::write(root.join("trace_marker"), "").expect("write marker");
        fs::write(root.join("tracing_on"), "1\n").expect("write tracing_on");

        fs::write(
            dir.path().join("mounts"),
            format!(
                "proc /proc proc rw,nosuid 0 0\ntracefs {} tracefs rw,relatime 0 0\n",
                root.display()
            ),
        )
        .expect("write mount table");

        let missing = dir.path().join("missing");
        fs::write(
            dir.path().join("config.toml"),
            format!(
                "[general]\nlog_console = false\n\n[paths]\nmounts = \"{}\"\ntracefs = \"{}\"\ndebugfs = \"{}\"\n",
                dir.path().join("mounts").display(),
                missing.display(),
                missing.display()
            ),
        )
        .expect("write config");

        Self { dir }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("tracing")
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    pub fn instance_dir(&self, name: &str) -> PathBuf {
        self.root().join("instances").join(name)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
