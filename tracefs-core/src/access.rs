//! Locked file access on an instance

use crate::error::{Result, TracefsError};
use crate::instance::{HeldFile, Instance};
use crate::logging::tracefs_warning;
use crate::options::{OptionsMask, OptionsState};
use crate::reader::{read_whole_file, FileBuffer};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{MutexGuard, PoisonError, TryLockError};

/// Clock file of an instance
pub const TRACE_CLOCK_FILE: &str = "trace_clock";

/// Exclusive access to an instance.
///
/// Obtained from [`Instance::lock`]. While it is alive no other thread can do file
/// I/O or touch the option masks through the same lock, so collaborators can hold
/// it across several accesses.
pub struct InstanceGuard<'a> {
    instance: &'a Instance,
    options: MutexGuard<'a, OptionsState>,
}

impl std::fmt::Debug for InstanceGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceGuard")
            .field("instance", &self.instance.name())
            .field("options", &*self.options)
            .finish()
    }
}

impl Instance {
    /// Take the lock guarding this instance: its own, or the shared top-level one.
    pub fn lock(&self) -> InstanceGuard<'_> {
        InstanceGuard {
            instance: self,
            options: self.options.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Take the lock only if nobody else holds it.
    pub fn try_lock(&self) -> Option<InstanceGuard<'_>> {
        let options = match self.options.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(InstanceGuard {
            instance: self,
            options,
        })
    }

    /// Read the whole of an instance file under the lock.
    pub fn read_file(&self, file: &str) -> Result<FileBuffer> {
        self.lock().read_file(file)
    }

    /// Replace the content of an instance file under the lock.
    pub fn write_file(&self, file: &str, content: impl AsRef<[u8]>) -> Result<()> {
        self.lock().write_file(file, content)
    }

    /// Write to an instance file without truncating it.
    pub fn append_file(&self, file: &str, content: impl AsRef<[u8]>) -> Result<()> {
        self.lock().append_file(file, content)
    }

    /// Open an instance file with truncation and write nothing.
    ///
    /// Files whose content is not reset by truncation (e.g. function probes in
    /// `set_ftrace_filter`) are left as they are.
    pub fn clear_file(&self, file: &str) -> Result<()> {
        self.lock().clear_file(file)
    }

    /// Read an instance file holding an integer.
    pub fn read_number(&self, file: &str) -> Result<i64> {
        self.lock().read_number(file)
    }

    /// Current trace clock, the entry marked with brackets in `trace_clock`.
    pub fn clock(&self) -> Result<String> {
        self.lock().clock()
    }

    /// Open an instance file with custom options. The caller owns the handle.
    pub fn open_file(&self, file: &str, options: &OpenOptions) -> Result<File> {
        let path = self.file_path(file)?;
        open_with(&path, options)
    }

    /// Open an instance file for reading and writing.
    pub fn open_file_rw(&self, file: &str) -> Result<File> {
        self.open_file(file, OpenOptions::new().read(true).write(true))
    }

    /// Write to a held descriptor, opening it on first use.
    pub fn write_held(&self, kind: HeldFile, content: impl AsRef<[u8]>) -> Result<()> {
        self.lock().write_held(kind, content)
    }

    /// Write a message to `trace_marker`.
    pub fn write_marker(&self, message: &str) -> Result<()> {
        self.write_held(HeldFile::Marker, message)
    }

    /// Write binary data to `trace_marker_raw`.
    pub fn write_marker_raw(&self, data: &[u8]) -> Result<()> {
        self.write_held(HeldFile::MarkerRaw, data)
    }

    pub fn is_held_open(&self, kind: HeldFile) -> bool {
        self.held[kind.index()].get().is_some()
    }

    /// Close a held descriptor; the next write reopens it.
    pub fn close_held(&mut self, kind: HeldFile) {
        self.held[kind.index()].take();
    }
}

impl<'a> InstanceGuard<'a> {
    pub fn instance(&self) -> &'a Instance {
        self.instance
    }

    pub fn read_file(&self, file: &str) -> Result<FileBuffer> {
        let path = self.instance.file_path(file)?;
        read_whole_file(&path, true)
    }

    pub fn write_file(&self, file: &str, content: impl AsRef<[u8]>) -> Result<()> {
        let path = self.instance.file_path(file)?;
        let mut f = open_with(&path, OpenOptions::new().write(true).truncate(true))?;
        write_once(&mut f, &path, content.as_ref())
    }

    pub fn append_file(&self, file: &str, content: impl AsRef<[u8]>) -> Result<()> {
        let path = self.instance.file_path(file)?;
        let mut f = open_with(&path, OpenOptions::new().write(true))?;
        write_once(&mut f, &path, content.as_ref())
    }

    pub fn clear_file(&self, file: &str) -> Result<()> {
        let path = self.instance.file_path(file)?;
        open_with(&path, OpenOptions::new().write(true).truncate(true)).map(drop)
    }

    pub fn read_number(&self, file: &str) -> Result<i64> {
        let buf = self.read_file(file)?;
        parse_c_integer(&buf.to_string_lossy()).ok_or_else(|| TracefsError::InvalidNumber {
            path: self.instance.file_path(file).unwrap_or_else(|_| PathBuf::from(file)),
        })
    }

    pub fn clock(&self) -> Result<String> {
        let buf = self.read_file(TRACE_CLOCK_FILE)?;
        selected_clock(&buf.to_string_lossy())
            .map(str::to_string)
            .ok_or_else(|| TracefsError::NoClockSelected {
                path: self
                    .instance
                    .file_path(TRACE_CLOCK_FILE)
                    .unwrap_or_else(|_| PathBuf::from(TRACE_CLOCK_FILE)),
            })
    }

    pub fn write_held(&self, kind: HeldFile, content: impl AsRef<[u8]>) -> Result<()> {
        let path = self.instance.file_path(kind.file_name())?;
        let slot = &self.instance.held[kind.index()];
        let mut file: &File = match slot.get() {
            Some(file) => file,
            None => {
                let opened = open_with(&path, OpenOptions::new().write(true))?;
                slot.get_or_init(|| opened)
            }
        };
        write_once(&mut file, &path, content.as_ref())
    }

    /// Supported-options mask, populated empty on first access
    pub fn supported_options_mask(&mut self) -> &mut OptionsMask {
        self.options.supported.get_or_insert_with(OptionsMask::empty)
    }

    /// Enabled-options mask, populated empty on first access
    pub fn enabled_options_mask(&mut self) -> &mut OptionsMask {
        self.options.enabled.get_or_insert_with(OptionsMask::empty)
    }

    /// Supported-options mask, captured with `load` on first query and cached.
    pub fn supported_options_or_load<F>(&mut self, load: F) -> Result<&mut OptionsMask>
    where
        F: FnOnce(&Instance) -> Result<OptionsMask>,
    {
        if self.options.supported.is_none() {
            self.options.supported = Some(load(self.instance)?);
        }
        Ok(self.supported_options_mask())
    }

    /// Enabled-options mask, captured with `load` on first query and cached.
    pub fn enabled_options_or_load<F>(&mut self, load: F) -> Result<&mut OptionsMask>
    where
        F: FnOnce(&Instance) -> Result<OptionsMask>,
    {
        if self.options.enabled.is_none() {
            self.options.enabled = Some(load(self.instance)?);
        }
        Ok(self.enabled_options_mask())
    }

    /// Cached masks, `None` while unpopulated
    pub fn cached_options(&self) -> (Option<OptionsMask>, Option<OptionsMask>) {
        (self.options.supported, self.options.enabled)
    }

    /// Drop both cached masks so the next query captures them again.
    pub fn invalidate_options(&mut self) {
        self.options.supported = None;
        self.options.enabled = None;
    }
}

fn open_with(path: &Path, options: &OpenOptions) -> Result<File> {
    options.open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            TracefsError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            tracefs_warning!("Failed to open '{}'", path.display());
            TracefsError::OpenFailed {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

/// Single write; a short write is reported instead of retried.
fn write_once<W: Write>(writer: &mut W, path: &Path, content: &[u8]) -> Result<()> {
    if content.is_empty() {
        return Ok(());
    }
    match writer.write(content) {
        Ok(n) if n == content.len() => Ok(()),
        Ok(n) => Err(TracefsError::PartialWrite {
            path: path.to_path_buf(),
            written: n,
            expected: content.len(),
        }),
        Err(e) => Err(TracefsError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Parse like C `strtoll(s, &end, 0)`: leading whitespace, optional sign,
/// `0x` hex or leading-zero octal, stopping at the first invalid digit.
/// Returns None when no digits were consumed or the value overflows.
pub(crate) fn parse_c_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let has_hex_digits = rest
        .as_bytes()
        .get(2)
        .is_some_and(|b| b.is_ascii_hexdigit());
    let (radix, digits) = if (rest.starts_with("0x") || rest.starts_with("0X")) && has_hex_digits
    {
        (16, &rest[2..])
    } else if rest.starts_with('0') {
        (8, rest)
    } else {
        (10, rest)
    };
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude = u64::from_str_radix(&digits[..end], radix).ok()?;
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

/// Name between the first `[` and the following `]`
pub(crate) fn selected_clock(clocks: &str) -> Option<&str> {
    let start = clocks.find('[')? + 1;
    let len = clocks[start..].find(']')?;
    Some(&clocks[start..start + len])
}
