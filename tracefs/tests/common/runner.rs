//! Runner for invoking the `tracefs` CLI from tests.
//!
//! Passes the fixture's config file and keeps logging off unless a test asks
//! for a log file or console output.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct RunOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Default)]
pub struct TracefsRunner {
    config: Option<PathBuf>,
    args: Vec<OsString>,
    log_file: Option<PathBuf>,
    log_console: bool,
    envs: Vec<(OsString, OsString)>,
}

impl TracefsRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_log_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.log_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn enable_console_log(mut self, yes: bool) -> Self {
        self.log_console = yes;
        self
    }

    pub fn env<K: Into<OsString>, V: Into<OsString>>(mut self, key: K, value: V) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn resolve_tracefs_bin() -> PathBuf {
        PathBuf::from(env!("CARGO_BIN_EXE_tracefs"))
    }

    pub fn run(self) -> RunOutput {
        let mut cmd = Command::new(Self::resolve_tracefs_bin());
        if let Some(config) = &self.config {
            cmd.arg("--config").arg(config);
        }
        match &self.log_file {
            Some(path) => {
                cmd.arg("--log").arg("--log-file").arg(path);
            }
            None if !self.log_console => {
                cmd.arg("--no-log");
            }
            None => {}
        }
        if self.log_console {
            cmd.arg("--log-console");
        }
        cmd.args(&self.args);
        cmd.env_remove("RUST_LOG");
        cmd.envs(self.envs.iter().map(|(k, v)| (k, v)));

        let output = cmd.output().expect("failed to spawn tracefs binary");
        RunOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}
