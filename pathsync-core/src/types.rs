//! Domain types shared by the sync engine and the job tracker.
//!
//! Filesystem paths are `PathBuf`. Remote working directories reported by the
//! scheduler are kept as `String` because they are compared verbatim against
//! scheduler output, never touched on the local filesystem.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a cluster profile in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterName(pub String);

impl fmt::Display for ClusterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ClusterName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ClusterName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A scheduler job identifier, kept verbatim (array jobs look like `123_4`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Directory listings
// ---------------------------------------------------------------------------

/// One entry of a detailed directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub is_dir: bool,
    /// Size in bytes. Meaningless for directories.
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Name → entry mapping produced by one listing call. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    entries: BTreeMap<String, FileEntry>,
}

impl DirectorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: FileEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&FileEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }

    /// Regular (non-directory) entries in name order.
    pub fn files(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values().filter(|e| !e.is_dir)
    }

    /// Directory entries in name order.
    pub fn dirs(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values().filter(|e| e.is_dir)
    }
}

impl FromIterator<FileEntry> for DirectorySnapshot {
    fn from_iter<I: IntoIterator<Item = FileEntry>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for entry in iter {
            snapshot.insert(entry);
        }
        snapshot
    }
}

// ---------------------------------------------------------------------------
// Scheduler jobs
// ---------------------------------------------------------------------------

/// Scheduler job state as reported by `sacct`.
///
/// Only the states the submission logic branches on get their own variant;
/// everything else is carried through as [`JobState::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Pending,
    Completed,
    Timeout,
    Cancelled,
    Other(String),
}

impl JobState {
    /// `true` for states that still occupy a slot on the queue.
    pub fn is_queued(&self) -> bool {
        matches!(self, JobState::Running | JobState::Pending)
    }
}

impl FromStr for JobState {
    type Err = std::convert::Infallible;

    /// Parses the leading word, so `CANCELLED by 1234` is `Cancelled`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.split_whitespace().next().unwrap_or("");
        Ok(match word {
            "RUNNING" => JobState::Running,
            "PENDING" => JobState::Pending,
            "COMPLETED" => JobState::Completed,
            "TIMEOUT" => JobState::Timeout,
            "CANCELLED" | "CANCELLED+" => JobState::Cancelled,
            _ => JobState::Other(s.trim().to_string()),
        })
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Running => write!(f, "RUNNING"),
            JobState::Pending => write!(f, "PENDING"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Timeout => write!(f, "TIMEOUT"),
            JobState::Cancelled => write!(f, "CANCELLED"),
            JobState::Other(raw) => write!(f, "{raw}"),
        }
    }
}

/// One row of the scheduler history report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Remote working directory the job was submitted from.
    pub workdir: String,
    /// Job name column; the submission script sets it to the job type.
    pub job_name: String,
    pub job_id: JobId,
    pub state: JobState,
    /// Elapsed wall time, verbatim (`HH:MM:SS` or `D-HH:MM:SS`).
    pub elapsed: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, is_dir: bool) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            is_dir,
            size: 0,
            modified: Utc::now(),
        }
    }

    #[test]
    fn newtype_display() {
        assert_eq!(ClusterName::from("alpine").to_string(), "alpine");
        assert_eq!(JobId::from("4242_1").to_string(), "4242_1");
    }

    #[test]
    fn snapshot_splits_files_and_dirs() {
        let snapshot: DirectorySnapshot = vec![
            entry("b.txt", false),
            entry("sub", true),
            entry("a.txt", false),
        ]
        .into_iter()
        .collect();

        let files: Vec<_> = snapshot.files().map(|e| e.name.as_str()).collect();
        let dirs: Vec<_> = snapshot.dirs().map(|e| e.name.as_str()).collect();
        assert_eq!(files, vec!["a.txt", "b.txt"]);
        assert_eq!(dirs, vec!["sub"]);
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn cancelled_with_actor_parses_as_cancelled() {
        let state: JobState = "CANCELLED by 51234".parse().unwrap();
        assert_eq!(state, JobState::Cancelled);
    }

    #[test]
    fn unknown_state_is_preserved() {
        let state: JobState = "OUT_OF_MEMORY".parse().unwrap();
        assert_eq!(state, JobState::Other("OUT_OF_MEMORY".to_string()));
        assert_eq!(state.to_string(), "OUT_OF_MEMORY");
    }

    #[test]
    fn only_running_and_pending_are_queued() {
        assert!(JobState::Running.is_queued());
        assert!(JobState::Pending.is_queued());
        assert!(!JobState::Timeout.is_queued());
        assert!(!JobState::Other("FAILED".into()).is_queued());
    }
}
