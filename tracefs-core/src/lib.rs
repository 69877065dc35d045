//! Access to the kernel tracing filesystem
//!
//! Locates the tracing directory (tracefs, or `tracing/` inside debugfs, mounting
//! either as a last resort), and provides [`Instance`] handles for the top-level
//! directory and named sub-instances with locked file access.
//!
//! ```no_run
//! use tracefs_core::Instance;
//!
//! # fn main() -> tracefs_core::Result<()> {
//! let inst = Instance::create("demo")?;
//! inst.write_file("tracing_on", "1")?;
//! println!("{}", inst.read_file("current_tracer")?.to_string_lossy());
//! inst.destroy();
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod error;
pub mod instance;
pub mod logging;
pub mod mounts;
pub mod options;
pub mod reader;
pub mod resolver;

pub use access::InstanceGuard;
pub use error::{Result, TracefsError};
pub use instance::{
    instance_exists, instance_exists_in, instances_walk, instances_walk_in, list_instances,
    list_instances_in, validate_instance_name, HeldFile, Instance, InstanceFlags,
};
pub use logging::{log_level, set_log_level, LogLevel};
pub use options::OptionsMask;
pub use reader::{read_whole_file, FileBuffer};
pub use resolver::{
    find_tracing_dir, init_tracing_dir, tracing_dir, tracing_file, Mounter, Resolver,
    SystemMounter, TracefsPaths, TracingDirCache,
};
