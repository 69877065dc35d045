//! Tracing instances
//!
//! An instance is either the top-level tracing directory or a named sub-instance
//! under `<tracing dir>/instances/<name>`. Every instance carries one lock guarding
//! its file I/O and cached option masks. Named instances own their lock; top-level
//! handles of the same tracing root share one lock and mask pair.

use crate::error::{Result, TracefsError};
use crate::logging::tracefs_warning;
use crate::options::OptionsState;
use crate::resolver::tracing_dir;
use bitflags::bitflags;
use std::fs::{self, DirBuilder, File};
use std::io;
use std::ops::ControlFlow;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use tracing::debug;

/// Directory below the tracing root holding named instances
pub const INSTANCES_DIR: &str = "instances";

/// Mode for new instance directories, before the process umask applies
pub const INSTANCE_DIR_MODE: u32 = 0o777;

bitflags! {
    /// Transient per-handle state
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InstanceFlags: u32 {
        /// The instance directory was created by this handle
        const NEWLY_CREATED = 1 << 0;
    }
}

/// Long-lived descriptors an instance may keep open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeldFile {
    FtraceFilter,
    FtraceNotrace,
    Marker,
    MarkerRaw,
}

impl HeldFile {
    pub const ALL: [HeldFile; 4] = [
        HeldFile::FtraceFilter,
        HeldFile::FtraceNotrace,
        HeldFile::Marker,
        HeldFile::MarkerRaw,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            HeldFile::FtraceFilter => "set_ftrace_filter",
            HeldFile::FtraceNotrace => "set_ftrace_notrace",
            HeldFile::Marker => "trace_marker",
            HeldFile::MarkerRaw => "trace_marker_raw",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone)]
enum TraceDir {
    /// System tracing directory, resolved through the process cache on first use
    System,
    Path(PathBuf),
}

pub(crate) type SharedOptions = Arc<Mutex<OptionsState>>;
type RootRegistry = Mutex<HashMap<PathBuf, Weak<Mutex<OptionsState>>>>;

fn new_options() -> SharedOptions {
    Arc::new(Mutex::new(OptionsState::new()))
}

/// Lock and masks shared by every top-level handle of one tracing root.
///
/// The system root has a single process-wide entry. Explicit roots are keyed by
/// path and live as long as some handle still refers to them.
fn toplevel_options(trace_dir: &TraceDir) -> SharedOptions {
    static SYSTEM: OnceLock<SharedOptions> = OnceLock::new();
    static ROOTS: OnceLock<RootRegistry> = OnceLock::new();

    match trace_dir {
        TraceDir::System => Arc::clone(SYSTEM.get_or_init(new_options)),
        TraceDir::Path(root) => {
            let mut roots = ROOTS
                .get_or_init(Default::default)
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(shared) = roots.get(root).and_then(Weak::upgrade) {
                return shared;
            }
            roots.retain(|_, weak| weak.strong_count() > 0);
            let shared = new_options();
            roots.insert(root.clone(), Arc::downgrade(&shared));
            shared
        }
    }
}

/// Reject names that would escape `instances/` or cannot be a directory name.
pub fn validate_instance_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(TracefsError::InvalidInstanceName(name.to_string()));
    }
    Ok(())
}

/// Handle to a tracing instance
pub struct Instance {
    trace_dir: TraceDir,
    name: Option<String>,
    pub(crate) options: SharedOptions,
    flags: InstanceFlags,
    pub(crate) held: [OnceLock<File>; 4],
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let held: Vec<&str> = HeldFile::ALL
            .iter()
            .filter(|k| self.is_held_open(**k))
            .map(|k| k.file_name())
            .collect();
        f.debug_struct("Instance")
            .field("trace_dir", &self.trace_dir)
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("held", &held)
            .finish()
    }
}

impl Instance {
    fn alloc(trace_dir: TraceDir, name: Option<&str>) -> Self {
        let options = match name {
            Some(_) => new_options(),
            None => toplevel_options(&trace_dir),
        };
        Self {
            trace_dir,
            name: name.map(str::to_string),
            options,
            flags: InstanceFlags::empty(),
            held: Default::default(),
        }
    }

    /// The implicit top-level instance of the system tracing directory.
    ///
    /// Never fails and performs no I/O; the tracing directory is resolved the first
    /// time a path is needed.
    pub fn top_level() -> Self {
        Self::alloc(TraceDir::System, None)
    }

    /// Top-level instance of an explicit tracing directory
    pub fn top_level_in(tracing_dir: impl Into<PathBuf>) -> Self {
        Self::alloc(TraceDir::Path(tracing_dir.into()), None)
    }

    /// Open the named instance in the system tracing directory, creating it if needed.
    pub fn create(name: &str) -> Result<Self> {
        validate_instance_name(name)?;
        Self::create_in(tracing_dir_owned()?, name)
    }

    /// Open the named instance below `tracing_dir`, creating its directory if needed.
    pub fn create_in(tracing_dir: impl Into<PathBuf>, name: &str) -> Result<Self> {
        validate_instance_name(name)?;
        let mut inst = Self::alloc(TraceDir::Path(tracing_dir.into()), Some(name));
        let path = inst.dir()?;

        if path.is_dir() {
            debug!("Using existing instance {}", path.display());
            return Ok(inst);
        }
        match DirBuilder::new().mode(INSTANCE_DIR_MODE).create(&path) {
            Ok(()) => {
                debug!("Created instance {}", path.display());
                inst.flags |= InstanceFlags::NEWLY_CREATED;
                Ok(inst)
            }
            // Lost a creation race: someone else owns the directory
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(inst),
            Err(e) => Err(TracefsError::DirectoryCreateFailed { path, source: e }),
        }
    }

    /// Allocate a handle for an existing instance without creating anything.
    ///
    /// `tracing_dir` defaults to the system tracing directory; `name` of `None`
    /// selects its top-level instance.
    pub fn attach(tracing_dir: Option<&Path>, name: Option<&str>) -> Result<Self> {
        let root = match tracing_dir {
            Some(dir) => {
                if !dir.is_dir() {
                    return Err(TracefsError::DirectoryNotFound {
                        path: dir.to_path_buf(),
                    });
                }
                dir.to_path_buf()
            }
            None if name.is_none() => {
                // Resolve now so a missing tracing filesystem is reported here
                crate::resolver::tracing_dir()?;
                return Ok(Self::alloc(TraceDir::System, None));
            }
            None => tracing_dir_owned()?,
        };
        if let Some(name) = name {
            validate_instance_name(name)?;
            let path = root.join(INSTANCES_DIR).join(name);
            if !path.is_dir() {
                return Err(TracefsError::DirectoryNotFound { path });
            }
        }
        Ok(Self::alloc(TraceDir::Path(root), name))
    }

    /// Name of the instance; `None` for the top level
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_top_level(&self) -> bool {
        self.name.is_none()
    }

    /// True if this handle created the instance directory
    pub fn is_new(&self) -> bool {
        self.flags.contains(InstanceFlags::NEWLY_CREATED)
    }

    pub fn flags(&self) -> InstanceFlags {
        self.flags
    }

    /// Tracing directory this instance lives in
    pub fn trace_dir(&self) -> Result<&Path> {
        match &self.trace_dir {
            TraceDir::System => tracing_dir(),
            TraceDir::Path(path) => Ok(path),
        }
    }

    /// Full path of the instance directory
    pub fn dir(&self) -> Result<PathBuf> {
        let root = self.trace_dir()?;
        Ok(match &self.name {
            Some(name) => root.join(INSTANCES_DIR).join(name),
            None => root.to_path_buf(),
        })
    }

    /// Full path of `file` inside the instance directory
    pub fn file_path(&self, file: &str) -> Result<PathBuf> {
        Ok(self.dir()?.join(file))
    }

    /// True if `name` exists in the instance directory and is not a directory
    pub fn file_exists(&self, name: &str) -> bool {
        self.check_exists(name, false)
    }

    /// True if `name` exists in the instance directory and is a directory
    pub fn dir_exists(&self, name: &str) -> bool {
        self.check_exists(name, true)
    }

    fn check_exists(&self, name: &str, want_dir: bool) -> bool {
        match self.dir() {
            Ok(dir) => path_exists(&dir.join(name), want_dir),
            Err(_) => false,
        }
    }

    /// Remove the instance directory whether or not this handle created it.
    pub fn remove(&self) -> Result<()> {
        if self.is_top_level() {
            tracefs_warning!("Cannot remove top instance");
            return Err(TracefsError::TopLevelInstance);
        }
        let path = self.dir()?;
        fs::remove_dir(&path).map_err(|e| TracefsError::RemoveFailed { path, source: e })
    }

    /// Release the handle.
    ///
    /// Held descriptors are closed. If this handle created the instance directory
    /// and it still exists, it is removed; a failed removal is only logged.
    pub fn destroy(mut self) {
        for kind in HeldFile::ALL {
            self.close_held(kind);
        }
        if !self.is_new() || self.is_top_level() {
            return;
        }
        let path = match self.dir() {
            Ok(path) => path,
            Err(_) => return,
        };
        if !path.is_dir() {
            return;
        }
        if let Err(e) = fs::remove_dir(&path) {
            tracefs_warning!("Failed to remove instance {}: {}", path.display(), e);
        } else {
            debug!("Removed instance {}", path.display());
        }
    }
}

fn tracing_dir_owned() -> Result<PathBuf> {
    tracing_dir().map(Path::to_path_buf)
}

fn path_exists(path: &Path, want_dir: bool) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_dir() == want_dir,
        Err(_) => false,
    }
}

/// True if a named instance exists in the system tracing directory.
pub fn instance_exists(name: &str) -> bool {
    match tracing_dir() {
        Ok(root) => instance_exists_in(root, name),
        Err(_) => false,
    }
}

/// True if a named instance exists below `tracing_dir`.
pub fn instance_exists_in(tracing_dir: &Path, name: &str) -> bool {
    if validate_instance_name(name).is_err() {
        return false;
    }
    path_exists(&tracing_dir.join(INSTANCES_DIR).join(name), true)
}

/// Call `callback` with the name of every instance in the system tracing
/// directory until it breaks.
pub fn instances_walk<F>(callback: F) -> Result<ControlFlow<()>>
where
    F: FnMut(&str) -> ControlFlow<()>,
{
    instances_walk_in(tracing_dir()?, callback)
}

/// Like [`instances_walk`] for an explicit tracing directory.
///
/// Entries of `instances/` that are not directories are skipped.
pub fn instances_walk_in<F>(tracing_dir: &Path, mut callback: F) -> Result<ControlFlow<()>>
where
    F: FnMut(&str) -> ControlFlow<()>,
{
    let path = tracing_dir.join(INSTANCES_DIR);
    if !path.is_dir() {
        return Err(TracefsError::DirectoryNotFound { path });
    }
    let entries = fs::read_dir(&path).map_err(|e| TracefsError::OpenFailed {
        path: path.clone(),
        source: e,
    })?;
    for entry in entries.flatten() {
        if !path_exists(&entry.path(), true) {
            continue;
        }
        let name = entry.file_name();
        if callback(&name.to_string_lossy()).is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }
    Ok(ControlFlow::Continue(()))
}

/// Sorted names of all instances in the system tracing directory
pub fn list_instances() -> Result<Vec<String>> {
    list_instances_in(tracing_dir()?)
}

/// Sorted names of all instances below `tracing_dir`
pub fn list_instances_in(tracing_dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    instances_walk_in(tracing_dir, |name| {
        names.push(name.to_string());
        ControlFlow::Continue(())
    })?;
    names.sort();
    Ok(names)
}
