//! Whole-file reads for tracing control files
//!
//! Files under the tracing directory report a size of zero, so they are read in
//! fixed chunks until EOF instead of being sized up front.

use crate::error::{Result, TracefsError};
use crate::logging::tracefs_warning;
use std::ffi::CStr;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Size of each read request
pub const READ_CHUNK_SIZE: usize = 8192;

/// Contents of a file plus a trailing NUL byte.
///
/// `len()` and `as_bytes()` exclude the terminator.
#[derive(Clone, PartialEq, Eq)]
pub struct FileBuffer {
    data: Vec<u8>,
}

impl FileBuffer {
    fn from_data(mut data: Vec<u8>) -> Self {
        data.push(0);
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.data
    }

    /// Content up to the first NUL as a C string
    pub fn as_c_str(&self) -> &CStr {
        CStr::from_bytes_until_nul(&self.data).unwrap_or_default()
    }

    /// Lossy UTF-8 view of the content
    pub fn to_string_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// Owned content without the terminator
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.data.pop();
        self.data
    }
}

impl std::fmt::Debug for FileBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBuffer")
            .field("len", &self.len())
            .field("content", &self.to_string_lossy())
            .finish()
    }
}

impl AsRef<[u8]> for FileBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Read all of `path`.
///
/// A missing file is `FileNotFound`; it is only reported as a warning when `warn`
/// is set, so optional files can be probed quietly. An empty file is a successful,
/// zero-length read.
pub fn read_whole_file(path: &Path, warn: bool) -> Result<FileBuffer> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            if warn {
                tracefs_warning!("File {} not found", path.display());
            }
            TracefsError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            if warn {
                tracefs_warning!("Failed to open {}: {}", path.display(), e);
            }
            TracefsError::OpenFailed {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;
    let data = read_chunks(file, path, warn)?;
    Ok(FileBuffer::from_data(data))
}

fn read_chunks<R: Read>(mut reader: R, path: &Path, warn: bool) -> Result<Vec<u8>> {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(TracefsError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        // Room for this chunk plus the terminator appended at the end
        if buf.try_reserve(n + 1).is_err() {
            if warn {
                tracefs_warning!("Failed to allocate file buffer");
            }
            return Err(TracefsError::AllocationFailure {
                path: path.to_path_buf(),
                requested: buf.len() + n + 1,
            });
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(buf)
}
