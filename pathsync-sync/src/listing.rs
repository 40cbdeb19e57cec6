//! Structured directory listings for remote roots.
//!
//! The remote side emits one NUL-terminated record per entry with fields
//! separated by tabs and the name last:
//!
//! ```text
//! <type flag>\t<size bytes>\t<mtime epoch seconds>\t<name>\0
//! ```
//!
//! so a name containing spaces, tabs or another entry's name never needs
//! disambiguation. `-L` reports the symlink target's type and attributes.

use std::path::Path;

use chrono::{DateTime, Utc};

use pathsync_core::FileEntry;

use crate::SyncError;

const RECORD_FORMAT: &str = r"'%y\t%s\t%T@\t%f\0'";

/// One record per child of `dir`.
pub(crate) fn children_command(dir: &Path) -> String {
    format!(
        "find -L {} -mindepth 1 -maxdepth 1 -printf {RECORD_FORMAT}",
        quote(dir)
    )
}

/// A single record describing `path` itself; empty output if it is missing.
pub(crate) fn stat_command(path: &Path) -> String {
    format!(
        "find -L {} -maxdepth 0 -printf {RECORD_FORMAT} 2>/dev/null",
        quote(path)
    )
}

pub(crate) fn quote(path: &Path) -> String {
    shell_words::quote(&path.to_string_lossy()).into_owned()
}

/// Parse every record in `output`.
pub(crate) fn parse_records(output: &str) -> Result<Vec<FileEntry>, SyncError> {
    output
        .split('\0')
        .filter(|record| !record.trim().is_empty())
        .map(parse_record)
        .collect()
}

fn parse_record(record: &str) -> Result<FileEntry, SyncError> {
    let record = record.trim_start_matches('\n');
    let mut fields = record.splitn(4, '\t');
    let kind = fields.next().unwrap_or_default();
    let size = fields.next();
    let mtime = fields.next();
    let name = fields.next().filter(|n| !n.is_empty());

    let fail = |entry: &str, reason: String| SyncError::ListingParse {
        entry: entry.to_string(),
        record: record.to_string(),
        reason,
    };

    let (Some(size), Some(mtime), Some(name)) = (size, mtime, name) else {
        return Err(fail(record, "expected 4 tab-separated fields".to_string()));
    };

    let is_dir = match kind {
        "d" => true,
        "f" | "l" | "p" | "s" | "c" | "b" | "D" => false,
        other => return Err(fail(name, format!("unknown type flag {other:?}"))),
    };
    let size: u64 = size
        .parse()
        .map_err(|e| fail(name, format!("bad size {size:?}: {e}")))?;
    let modified = parse_epoch(mtime).ok_or_else(|| fail(name, format!("bad mtime {mtime:?}")))?;

    Ok(FileEntry {
        name: name.to_string(),
        is_dir,
        size,
        modified,
    })
}

/// `1700000000.1234567890` → UTC timestamp, nanosecond precision.
fn parse_epoch(raw: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = raw.split_once('.').unwrap_or((raw, ""));
    let secs: i64 = secs.parse().ok()?;
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut digits: String = frac.chars().take(9).collect();
    while digits.len() < 9 {
        digits.push('0');
    }
    let nanos: u32 = digits.parse().ok()?;
    DateTime::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_files_and_directories() {
        let out = "f\t10\t1700000000.5000000000\ta.txt\0d\t4096\t1700000100.0000000000\tsub dir\0";
        let entries = parse_records(out).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert!(!entries[0].is_dir);
        assert_eq!(entries[0].size, 10);
        assert_eq!(entries[0].modified.timestamp(), 1_700_000_000);
        assert_eq!(entries[0].modified.timestamp_subsec_millis(), 500);
        assert_eq!(entries[1].name, "sub dir");
        assert!(entries[1].is_dir);
    }

    #[test]
    fn name_may_contain_tabs_and_other_names() {
        let out = "f\t1\t1700000000\ta.txt\tcopy of a.txt\0f\t2\t1700000000\ta.txt\0";
        let entries = parse_records(out).unwrap();
        assert_eq!(entries[0].name, "a.txt\tcopy of a.txt");
        assert_eq!(entries[1].name, "a.txt");
    }

    #[test]
    fn bad_size_names_the_entry() {
        let err = parse_records("f\tlots\t1700000000.0\tbroken.bin\0").unwrap_err();
        match err {
            SyncError::ListingParse { entry, record, .. } => {
                assert_eq!(entry, "broken.bin");
                assert!(record.contains("lots"));
            }
            other => panic!("expected listing parse error, got {other:?}"),
        }
    }

    #[test]
    fn truncated_record_is_rejected() {
        let err = parse_records("f\t10\0").unwrap_err();
        assert!(matches!(err, SyncError::ListingParse { .. }));
    }

    #[test]
    fn empty_output_is_an_empty_listing() {
        assert!(parse_records("").unwrap().is_empty());
    }

    #[test]
    fn commands_quote_paths() {
        let cmd = children_command(Path::new("/scratch/my runs"));
        assert!(cmd.contains("'/scratch/my runs'"), "{cmd}");
        assert!(cmd.contains("-maxdepth 1"));
    }
}
