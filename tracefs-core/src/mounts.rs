//! Mount table scanning (`/proc/mounts` format)

use std::io::BufRead;
use std::path::PathBuf;
use tracing::debug;

pub const TRACEFS_TYPE: &str = "tracefs";
pub const DEBUGFS_TYPE: &str = "debugfs";

/// One parsed mount table line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub mount_point: PathBuf,
    pub fs_type: String,
}

impl MountEntry {
    /// Parse `<device> <mountpoint> <fstype> <options> <dump> <pass>`.
    /// Returns None for malformed or truncated lines.
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 6 {
            return None;
        }
        if parts[4].parse::<i32>().is_err() || parts[5].parse::<i32>().is_err() {
            return None;
        }
        Some(Self {
            mount_point: PathBuf::from(unescape_mount_field(parts[1])),
            fs_type: parts[2].to_string(),
        })
    }
}

/// Decode the kernel's octal escapes (`\040` space, `\011` tab, `\012` newline, `\134` backslash).
pub fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(b) = u8::try_from(value) {
                    out.push(b);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// What a mount table scan found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountScan {
    /// Mount point of the first tracefs entry; scanning stops there
    pub tracefs: Option<PathBuf>,
    /// Mount point of the first debugfs entry seen before any tracefs entry
    pub debugfs: Option<PathBuf>,
    /// Lines skipped because they could not be parsed
    pub skipped: usize,
}

/// Scan a mount table, stopping at the first tracefs entry and remembering the
/// first debugfs entry. Unreadable or malformed lines are skipped.
pub fn scan_mounts<R: BufRead>(mut reader: R) -> MountScan {
    let mut scan = MountScan::default();
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Stopping mount table scan on read error: {}", e);
                break;
            }
        }
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }
        let Some(entry) = MountEntry::parse(line) else {
            debug!("Skipping malformed mount table line: {:?}", line);
            scan.skipped += 1;
            continue;
        };
        if entry.fs_type == TRACEFS_TYPE {
            scan.tracefs = Some(entry.mount_point);
            break;
        }
        if scan.debugfs.is_none() && entry.fs_type == DEBUGFS_TYPE {
            scan.debugfs = Some(entry.mount_point);
        }
    }
    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn scan(table: &str) -> MountScan {
        scan_mounts(table.as_bytes())
    }

    #[test]
    fn test_parse_entry() {
        let entry = MountEntry::parse("tracefs /sys/kernel/tracing tracefs rw,nosuid 0 0").unwrap();
        assert_eq!(entry.mount_point, Path::new("/sys/kernel/tracing"));
        assert_eq!(entry.fs_type, "tracefs");
    }

    #[test]
    fn test_parse_rejects_truncated_and_non_numeric() {
        assert!(MountEntry::parse("tracefs /sys/kernel/tracing tracefs").is_none());
        assert!(MountEntry::parse("tracefs /sys/kernel/tracing tracefs rw x 0").is_none());
        assert!(MountEntry::parse("").is_none());
    }

    #[test]
    fn test_unescape_octal() {
        assert_eq!(unescape_mount_field("/mnt/my\\040dir"), "/mnt/my dir");
        assert_eq!(unescape_mount_field("/a\\134b"), "/a\\b");
        // Not an escape: left untouched
        assert_eq!(unescape_mount_field("/a\\9zz"), "/a\\9zz");
        assert_eq!(unescape_mount_field("/trailing\\04"), "/trailing\\04");
    }

    #[test]
    fn test_tracefs_stops_scan() {
        let s = scan(
            "proc /proc proc rw 0 0\n\
             tracefs /sys/kernel/tracing tracefs rw 0 0\n\
             debugfs /sys/kernel/debug debugfs rw 0 0\n",
        );
        assert_eq!(s.tracefs.as_deref(), Some(Path::new("/sys/kernel/tracing")));
        assert_eq!(s.debugfs, None);
    }

    #[test]
    fn test_first_debugfs_is_remembered() {
        let s = scan(
            "debugfs /first debugfs rw 0 0\n\
             debugfs /second debugfs rw 0 0\n",
        );
        assert_eq!(s.tracefs, None);
        assert_eq!(s.debugfs.as_deref(), Some(Path::new("/first")));
    }

    #[test]
    fn test_malformed_lines_do_not_abort() {
        let s = scan(
            "garbage\n\
             debugfs /sys/kernel/debug debugfs\n\
             \n\
             tracefs /t tracefs rw 0 0",
        );
        assert_eq!(s.tracefs.as_deref(), Some(Path::new("/t")));
        assert_eq!(s.skipped, 2);
    }

    #[test]
    fn test_invalid_utf8_line_is_tolerated() {
        let mut table = b"\xff\xfe bad line\n".to_vec();
        table.extend_from_slice(b"debugfs /dbg debugfs rw 0 0\n");
        let s = scan_mounts(&table[..]);
        assert_eq!(s.debugfs.as_deref(), Some(Path::new("/dbg")));
    }
}
