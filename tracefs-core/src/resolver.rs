//! Tracing directory discovery
//!
//! The tracing filesystem is either mounted as `tracefs` on its own, or lives in the
//! `tracing` subdirectory of a `debugfs` mount. Discovery walks the mount table and
//! falls back to mounting either filesystem at its canonical location.

use crate::error::{Result, TracefsError};
use crate::logging::tracefs_warning;
use crate::mounts::{scan_mounts, DEBUGFS_TYPE, TRACEFS_TYPE};
use serde::{Deserialize, Serialize};
use std::ffi::CString;
use std::fs::File;
use std::io::{self, BufReader};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::{debug, info};

pub const DEFAULT_MOUNTS_PATH: &str = "/proc/mounts";
pub const DEFAULT_TRACEFS_PATH: &str = "/sys/kernel/tracing";
pub const DEFAULT_DEBUGFS_PATH: &str = "/sys/kernel/debug";

/// Subdirectory of a debugfs mount holding the tracing files
pub const DEBUGFS_TRACING_SUBDIR: &str = "tracing";

/// Well-known locations used by discovery
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TracefsPaths {
    /// Mount table to scan
    #[serde(default = "default_mounts")]
    pub mounts: PathBuf,
    /// Canonical tracefs mount point
    #[serde(default = "default_tracefs")]
    pub tracefs: PathBuf,
    /// Canonical debugfs mount point
    #[serde(default = "default_debugfs")]
    pub debugfs: PathBuf,
}

fn default_mounts() -> PathBuf {
    PathBuf::from(DEFAULT_MOUNTS_PATH)
}

fn default_tracefs() -> PathBuf {
    PathBuf::from(DEFAULT_TRACEFS_PATH)
}

fn default_debugfs() -> PathBuf {
    PathBuf::from(DEFAULT_DEBUGFS_PATH)
}

impl Default for TracefsPaths {
    fn default() -> Self {
        Self {
            mounts: default_mounts(),
            tracefs: default_tracefs(),
            debugfs: default_debugfs(),
        }
    }
}

/// Mount a pseudo filesystem of type `fs_type` at `target` with no device and no flags.
pub trait Mounter {
    fn mount(&self, fs_type: &str, target: &Path) -> io::Result<()>;
}

impl<M: Mounter + ?Sized> Mounter for &M {
    fn mount(&self, fs_type: &str, target: &Path) -> io::Result<()> {
        (**self).mount(fs_type, target)
    }
}

/// Mounter backed by the `mount(2)` system call
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMounter;

impl Mounter for SystemMounter {
    fn mount(&self, fs_type: &str, target: &Path) -> io::Result<()> {
        let to_cstring = |bytes: &[u8]| {
            CString::new(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
        };
        let source = to_cstring(b"nodev")?;
        let target = to_cstring(target.as_os_str().as_bytes())?;
        let fs_type = to_cstring(fs_type.as_bytes())?;
        let ret = unsafe {
            libc::mount(
                source.as_ptr(),
                target.as_ptr(),
                fs_type.as_ptr(),
                0,
                std::ptr::null(),
            )
        };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

/// Discovers the tracing directory from a mount table, mounting as a last resort
#[derive(Debug, Clone, Default)]
pub struct Resolver<M: Mounter = SystemMounter> {
    paths: TracefsPaths,
    mounter: M,
}

impl Resolver<SystemMounter> {
    pub fn new(paths: TracefsPaths) -> Self {
        Self::with_mounter(paths, SystemMounter)
    }
}

impl<M: Mounter> Resolver<M> {
    pub fn with_mounter(paths: TracefsPaths, mounter: M) -> Self {
        Self { paths, mounter }
    }

    pub fn paths(&self) -> &TracefsPaths {
        &self.paths
    }

    /// Find the tracing directory. Performs the full scan on every call.
    pub fn find_tracing_dir(&self) -> Result<PathBuf> {
        let mounts = &self.paths.mounts;
        let file = File::open(mounts).map_err(|e| {
            tracefs_warning!("Can't open {} for read", mounts.display());
            if e.kind() == io::ErrorKind::NotFound {
                TracefsError::DirectoryNotFound {
                    path: mounts.clone(),
                }
            } else {
                TracefsError::MountTableUnreadable {
                    path: mounts.clone(),
                    source: e,
                }
            }
        })?;
        let scan = scan_mounts(BufReader::new(file));

        if let Some(tracefs) = scan.tracefs {
            debug!("Found tracefs mounted at {}", tracefs.display());
            return Ok(tracefs);
        }

        if self.try_mount(TRACEFS_TYPE, &self.paths.tracefs) {
            info!("Mounted tracefs at {}", self.paths.tracefs.display());
            return Ok(self.paths.tracefs.clone());
        }

        let debugfs = match scan.debugfs {
            Some(debugfs) => debugfs,
            None => {
                if !self.try_mount(DEBUGFS_TYPE, &self.paths.debugfs) {
                    tracefs_warning!("debugfs not mounted, please mount");
                    return Err(TracefsError::NoTracingFilesystemAvailable);
                }
                info!("Mounted debugfs at {}", self.paths.debugfs.display());
                self.paths.debugfs.clone()
            }
        };
        Ok(debugfs.join(DEBUGFS_TRACING_SUBDIR))
    }

    /// The canonical mount point must exist before a mount is attempted.
    fn try_mount(&self, fs_type: &str, target: &Path) -> bool {
        if std::fs::metadata(target).is_err() {
            debug!("Not mounting {}: {} does not exist", fs_type, target.display());
            return false;
        }
        match self.mounter.mount(fs_type, target) {
            Ok(()) => true,
            Err(e) => {
                debug!("Mounting {} at {} failed: {}", fs_type, target.display(), e);
                false
            }
        }
    }
}

/// Write-once cache for a resolved tracing directory.
///
/// Only a successful resolution is stored. Concurrent first callers are serialised
/// on `init`, so discovery (and any mount attempt) runs once.
#[derive(Debug)]
pub struct TracingDirCache {
    dir: OnceLock<PathBuf>,
    init: Mutex<()>,
}

impl Default for TracingDirCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingDirCache {
    pub const fn new() -> Self {
        Self {
            dir: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Cached directory, if one has been resolved
    pub fn get(&self) -> Option<&Path> {
        self.dir.get().map(PathBuf::as_path)
    }

    /// Return the cached directory or resolve it with `resolver`.
    pub fn get_or_resolve<M: Mounter>(&self, resolver: &Resolver<M>) -> Result<&Path> {
        self.get_or_try_init(|| resolver.find_tracing_dir())
    }

    fn get_or_try_init<F>(&self, resolve: F) -> Result<&Path>
    where
        F: FnOnce() -> Result<PathBuf>,
    {
        if let Some(dir) = self.get() {
            return Ok(dir);
        }
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(dir) = self.get() {
            return Ok(dir);
        }
        let dir = resolve()?;
        Ok(self.dir.get_or_init(|| dir).as_path())
    }
}

static TRACING_DIR: TracingDirCache = TracingDirCache::new();

/// Find the system tracing directory without consulting the process cache.
pub fn find_tracing_dir() -> Result<PathBuf> {
    Resolver::new(TracefsPaths::default()).find_tracing_dir()
}

/// The system tracing directory, discovered once per process.
pub fn tracing_dir() -> Result<&'static Path> {
    TRACING_DIR.get_or_resolve(&Resolver::new(TracefsPaths::default()))
}

/// Seed the process cache using a custom resolver (e.g. non-default mount points).
/// A directory that is already cached wins.
pub fn init_tracing_dir<M: Mounter>(resolver: &Resolver<M>) -> Result<&'static Path> {
    TRACING_DIR.get_or_resolve(resolver)
}

/// Full path of `name` inside the system tracing directory.
pub fn tracing_file(name: &str) -> Result<PathBuf> {
    Ok(tracing_dir()?.join(name))
}
