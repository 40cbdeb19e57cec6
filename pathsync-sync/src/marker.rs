//! Per-directory `last_updated.txt` markers.
//!
//! A marker holds the epoch time of the last successful pass over its
//! directory as a float, e.g. `1718000000.123456`. It is rewritten on every
//! pass and never transferred.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::root::PathRoot;
use crate::SyncError;

pub const MARKER_FILE_NAME: &str = "last_updated.txt";

pub fn marker_path(dir: &Path) -> PathBuf {
    dir.join(MARKER_FILE_NAME)
}

fn format_epoch(at: DateTime<Utc>) -> String {
    format!("{:.6}", at.timestamp_micros() as f64 / 1e6)
}

fn parse_epoch(text: &str) -> Option<DateTime<Utc>> {
    let value: f64 = text.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    DateTime::from_timestamp_micros((value * 1e6).round() as i64)
}

/// Stamp `dir` on `root` with `at`.
pub fn write_marker(root: &PathRoot, dir: &Path, at: DateTime<Utc>) -> Result<(), SyncError> {
    root.write_text(&marker_path(dir), &format_epoch(at))
}

/// Time stored in the marker of `dir`, `None` if there is no marker.
///
/// Only the last non-empty line is read so shell noise before the value does
/// not matter.
pub fn read_marker(root: &PathRoot, dir: &Path) -> Result<Option<DateTime<Utc>>, SyncError> {
    let path = marker_path(dir);
    let Some(content) = root.read_text(&path)? else {
        return Ok(None);
    };
    let last = content.lines().rev().find(|l| !l.trim().is_empty());
    match last {
        None => Ok(None),
        Some(line) => parse_epoch(line).map(Some).ok_or(SyncError::Marker {
            path,
            content: line.to_string(),
        }),
    }
}

/// `true` if `dir` should be synced again: `force`, no marker, or a marker
/// older than `max_age`.
pub fn needs_check(
    root: &PathRoot,
    dir: &Path,
    max_age: Duration,
    force: bool,
) -> Result<bool, SyncError> {
    if force {
        return Ok(true);
    }
    let Some(stamped) = read_marker(root, dir)? else {
        return Ok(true);
    };
    let age = Utc::now().signed_duration_since(stamped);
    Ok(age.to_std().map_or(false, |age| age > max_age))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn write_then_read_keeps_microseconds() {
        let tmp = TempDir::new().unwrap();
        let root = PathRoot::local(tmp.path());
        let at = DateTime::from_timestamp_micros(1_718_000_000_123_456).unwrap();

        write_marker(&root, tmp.path(), at).unwrap();
        let raw = fs::read_to_string(marker_path(tmp.path())).unwrap();
        assert_eq!(raw, "1718000000.123456");
        assert_eq!(read_marker(&root, tmp.path()).unwrap(), Some(at));
    }

    #[test]
    fn missing_marker_needs_check() {
        let tmp = TempDir::new().unwrap();
        let root = PathRoot::local(tmp.path());
        assert_eq!(read_marker(&root, tmp.path()).unwrap(), None);
        assert!(needs_check(&root, tmp.path(), Duration::from_secs(3600), false).unwrap());
    }

    #[test]
    fn fresh_marker_skips_unless_forced() {
        let tmp = TempDir::new().unwrap();
        let root = PathRoot::local(tmp.path());
        write_marker(&root, tmp.path(), Utc::now()).unwrap();

        assert!(!needs_check(&root, tmp.path(), Duration::from_secs(3600), false).unwrap());
        assert!(needs_check(&root, tmp.path(), Duration::from_secs(3600), true).unwrap());
    }

    #[test]
    fn old_marker_needs_check() {
        let tmp = TempDir::new().unwrap();
        let root = PathRoot::local(tmp.path());
        let old = Utc::now() - chrono::Duration::days(10);
        write_marker(&root, tmp.path(), old).unwrap();
        assert!(needs_check(&root, tmp.path(), Duration::from_secs(86_400), false).unwrap());
    }

    #[test]
    fn legacy_plain_float_and_trailing_noise() {
        let tmp = TempDir::new().unwrap();
        let root = PathRoot::local(tmp.path());
        fs::write(marker_path(tmp.path()), "motd line\n1700000000.5\n\n").unwrap();
        let at = read_marker(&root, tmp.path()).unwrap().unwrap();
        assert_eq!(at.timestamp_millis(), 1_700_000_000_500);
    }

    #[test]
    fn garbage_marker_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let root = PathRoot::local(tmp.path());
        fs::write(marker_path(tmp.path()), "yesterday").unwrap();
        let err = read_marker(&root, tmp.path()).unwrap_err();
        assert!(matches!(err, SyncError::Marker { .. }));
    }
}
