//! One filesystem root, local or reached through an execution channel.
//!
//! Local roots use `std::fs` for listings, probes and mutations. Remote roots
//! build every operation out of [`PathRoot::run_raw`]. Archive commands run
//! through a shell on both kinds of root.
//!
//! Every mutating operation checks ownership first: the target must be the
//! root or a descendant of it, with no `..` components.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use pathsync_core::{DirectorySnapshot, FileEntry};

use crate::channel::{ChannelError, CommandOutput, ExecChannel, LocalShell, TransferChannel};
use crate::error::{io_err, SyncError};
use crate::filter::ArchiveFilter;
use crate::listing::{self, quote};
use crate::marker::MARKER_FILE_NAME;

/// File extension of archives produced by [`PathRoot::archive`].
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Channel handles for a remote root. Cloning shares the connection.
#[derive(Debug, Clone)]
pub struct RemoteHandle {
    pub hostname: String,
    pub exec: Arc<dyn ExecChannel>,
    pub transfer: Arc<dyn TransferChannel>,
}

impl RemoteHandle {
    pub fn new(
        hostname: impl Into<String>,
        exec: Arc<dyn ExecChannel>,
        transfer: Arc<dyn TransferChannel>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            exec,
            transfer,
        }
    }

    /// `true` if both handles ride on the same execution channel.
    pub fn same_channel(&self, other: &RemoteHandle) -> bool {
        Arc::ptr_eq(&self.exec, &other.exec)
    }
}

#[derive(Debug, Clone)]
enum Location {
    Local,
    Remote(RemoteHandle),
}

/// A filesystem root plus the primitives the sync engine needs on it.
#[derive(Debug, Clone)]
pub struct PathRoot {
    root: PathBuf,
    location: Location,
}

impl PathRoot {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            location: Location::Local,
        }
    }

    pub fn remote(root: impl Into<PathBuf>, handle: RemoteHandle) -> Self {
        Self {
            root: root.into(),
            location: Location::Remote(handle),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.location, Location::Remote(_))
    }

    pub fn hostname(&self) -> Option<&str> {
        self.remote_handle().map(|h| h.hostname.as_str())
    }

    pub fn remote_handle(&self) -> Option<&RemoteHandle> {
        match &self.location {
            Location::Local => None,
            Location::Remote(handle) => Some(handle),
        }
    }

    /// Swap in a new channel. The old one is dropped by this root but not
    /// closed; other roots cloned from it keep using it.
    pub fn replace_channel(&mut self, handle: RemoteHandle) {
        self.location = Location::Remote(handle);
    }

    /// Fails with [`SyncError::PathOutsideRoot`] unless `path` is owned.
    pub fn ensure_owned(&self, path: &Path) -> Result<(), SyncError> {
        let escapes = path.components().any(|c| matches!(c, Component::ParentDir));
        if escapes || !path.starts_with(&self.root) {
            return Err(SyncError::PathOutsideRoot {
                path: path.to_path_buf(),
                root: self.root.clone(),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn execute(&self, command: &str) -> Result<CommandOutput, SyncError> {
        tracing::debug!("[{}] $ {command}", self.label());
        let output = match &self.location {
            Location::Local => LocalShell.execute(command)?,
            Location::Remote(handle) => handle.exec.execute(command)?,
        };
        Ok(output)
    }

    /// Run `command` and return its stdout, whatever its exit status.
    pub fn run_raw(&self, command: &str) -> Result<String, SyncError> {
        Ok(self.execute(command)?.stdout)
    }

    /// Run `command`; a non-zero exit is [`ChannelError::CommandFailed`].
    pub fn run_checked(&self, command: &str) -> Result<String, SyncError> {
        let output = self.execute(command)?;
        if output.success() {
            return Ok(output.stdout);
        }
        Err(ChannelError::CommandFailed {
            command: command.to_string(),
            status: output.status.unwrap_or(-1),
            stderr: output.stderr.trim().to_string(),
        }
        .into())
    }

    fn label(&self) -> &str {
        self.hostname().unwrap_or("local")
    }

    // -----------------------------------------------------------------------
    // Listings and probes
    // -----------------------------------------------------------------------

    /// Names of the entries in `path`, without `.` and `..`.
    pub fn list_names(&self, path: &Path) -> Result<BTreeSet<String>, SyncError> {
        match &self.location {
            Location::Local => {
                let entries = std::fs::read_dir(path).map_err(|e| io_err(path, e))?;
                let mut names = BTreeSet::new();
                for entry in entries {
                    let entry = entry.map_err(|e| io_err(path, e))?;
                    names.insert(entry.file_name().to_string_lossy().into_owned());
                }
                Ok(names)
            }
            Location::Remote(_) => {
                let out = self.run_checked(&format!("ls -a -- {}", quote(path)))?;
                Ok(out
                    .lines()
                    .filter(|name| !matches!(*name, "" | "." | ".."))
                    .map(str::to_string)
                    .collect())
            }
        }
    }

    /// Type, size and modification time of every entry in `path`.
    pub fn detailed_snapshot(&self, path: &Path) -> Result<DirectorySnapshot, SyncError> {
        match &self.location {
            Location::Local => {
                let entries = std::fs::read_dir(path).map_err(|e| io_err(path, e))?;
                let mut snapshot = DirectorySnapshot::new();
                for entry in entries {
                    let entry = entry.map_err(|e| io_err(path, e))?;
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if let Some(file) = local_entry(&entry.path(), name)? {
                        snapshot.insert(file);
                    }
                }
                Ok(snapshot)
            }
            Location::Remote(_) => {
                let out = self.run_checked(&listing::children_command(path))?;
                Ok(listing::parse_records(&out)?.into_iter().collect())
            }
        }
    }

    /// Attributes of a single path, `None` if it does not exist.
    pub fn stat(&self, path: &Path) -> Result<Option<FileEntry>, SyncError> {
        match &self.location {
            Location::Local => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                local_entry(path, name)
            }
            Location::Remote(_) => {
                let out = self.run_raw(&listing::stat_command(path))?;
                Ok(listing::parse_records(&out)?.into_iter().next())
            }
        }
    }

    pub fn exists(&self, path: &Path) -> Result<bool, SyncError> {
        match &self.location {
            Location::Local => Ok(path.exists()),
            Location::Remote(_) => self.test_flag("-e", path),
        }
    }

    pub fn is_dir(&self, path: &Path) -> Result<bool, SyncError> {
        match &self.location {
            Location::Local => Ok(path.is_dir()),
            Location::Remote(_) => self.test_flag("-d", path),
        }
    }

    fn test_flag(&self, flag: &str, path: &Path) -> Result<bool, SyncError> {
        let out = self.run_raw(&format!(
            "test {flag} {} && echo yes || echo no",
            quote(path)
        ))?;
        Ok(out.trim() == "yes")
    }

    // -----------------------------------------------------------------------
    // Mutations (ownership-guarded)
    // -----------------------------------------------------------------------

    /// Create `path` and any missing parents. Idempotent.
    pub fn make_dir(&self, path: &Path) -> Result<(), SyncError> {
        self.ensure_owned(path)?;
        match &self.location {
            Location::Local => std::fs::create_dir_all(path).map_err(|e| io_err(path, e)),
            Location::Remote(_) => {
                self.run_checked(&format!("mkdir -p -- {}", quote(path)))?;
                Ok(())
            }
        }
    }

    /// Remove `path`, recursively if it is a directory.
    pub fn remove(&self, path: &Path) -> Result<(), SyncError> {
        self.ensure_owned(path)?;
        match &self.location {
            Location::Local => {
                let result = if path.is_dir() {
                    std::fs::remove_dir_all(path)
                } else {
                    std::fs::remove_file(path)
                };
                result.map_err(|e| io_err(path, e))
            }
            Location::Remote(_) => {
                let flag = if self.is_dir(path)? { "-r " } else { "" };
                self.run_checked(&format!("rm {flag}-- {}", quote(path)))?;
                Ok(())
            }
        }
    }

    /// Read a small text file, `None` if it does not exist.
    pub fn read_text(&self, path: &Path) -> Result<Option<String>, SyncError> {
        match &self.location {
            Location::Local => match std::fs::read_to_string(path) {
                Ok(content) => Ok(Some(content)),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
                Err(err) => Err(io_err(path, err)),
            },
            Location::Remote(_) => {
                let out = self.execute(&format!("cat -- {}", quote(path)))?;
                Ok(out.success().then_some(out.stdout))
            }
        }
    }

    /// Create or overwrite a small text file.
    pub fn write_text(&self, path: &Path, content: &str) -> Result<(), SyncError> {
        self.ensure_owned(path)?;
        match &self.location {
            Location::Local => std::fs::write(path, content).map_err(|e| io_err(path, e)),
            Location::Remote(_) => {
                self.run_checked(&format!(
                    "printf '%s' {} > {}",
                    shell_words::quote(content),
                    quote(path)
                ))?;
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Archives
    // -----------------------------------------------------------------------

    /// Where [`PathRoot::archive`] puts the archive of `dir`: next to it.
    pub fn archive_path_for(dir: &Path) -> PathBuf {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        dir.with_file_name(format!("{name}.{ARCHIVE_EXTENSION}"))
    }

    /// Pack the contents of `dir` into `<parent>/<name>.tar.gz`.
    ///
    /// Sync markers are never packed, so an archive transfer leaves the
    /// destination's markers alone. An existing file at the archive path is
    /// [`SyncError::ArchiveExists`].
    pub fn archive(&self, dir: &Path, filter: &ArchiveFilter) -> Result<PathBuf, SyncError> {
        let archive = Self::archive_path_for(dir);
        self.ensure_owned(&archive)?;
        self.ensure_vacant(&archive)?;
        let (dir_q, archive_q) = (quote(dir), quote(&archive));
        let mut excludes = vec![format!("--exclude={MARKER_FILE_NAME}")];
        let command = match filter {
            ArchiveFilter::All => {
                format!("tar -czf {archive_q} {} -C {dir_q} .", excludes.join(" "))
            }
            ArchiveFilter::Exclude(names) => {
                excludes.extend(
                    names
                        .iter()
                        .map(|n| format!("--exclude={}", shell_words::quote(n))),
                );
                format!("tar -czf {archive_q} {} -C {dir_q} .", excludes.join(" "))
            }
            ArchiveFilter::Include(names) => {
                let matches: Vec<String> = names
                    .iter()
                    .map(|n| format!("-name {}", shell_words::quote(n)))
                    .collect();
                format!(
                    "cd {dir_q} && find . -mindepth 1 \\( {} \\) -print0 | tar -czf {archive_q} {} --null -T -",
                    matches.join(" -o "),
                    excludes.join(" ")
                )
            }
        };
        self.run_checked(&command)?;
        Ok(archive)
    }

    /// Fails with [`SyncError::ArchiveExists`] if something is at `archive`.
    pub fn ensure_vacant(&self, archive: &Path) -> Result<(), SyncError> {
        if self.exists(archive)? {
            return Err(SyncError::ArchiveExists {
                path: archive.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Expand `archive` into `<parent>/<stem>/`, next to the archive.
    ///
    /// With `overwrite = false`, files that already exist are left alone.
    pub fn unarchive(&self, archive: &Path, overwrite: bool) -> Result<PathBuf, SyncError> {
        let target = unarchive_target(archive);
        self.ensure_owned(&target)?;
        let keep = if overwrite { "" } else { " --skip-old-files" };
        self.run_checked(&format!(
            "mkdir -p -- {target} && tar -xzf {}{keep} -C {target}",
            quote(archive),
            target = quote(&target),
        ))?;
        Ok(target)
    }
}

fn unarchive_target(archive: &Path) -> PathBuf {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = format!(".{ARCHIVE_EXTENSION}");
    let stem = name.strip_suffix(&suffix).unwrap_or(&name);
    archive.with_file_name(stem)
}

/// Follows symlinks; a dangling link is reported with its own attributes.
fn local_entry(path: &Path, name: String) -> Result<Option<FileEntry>, SyncError> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => match std::fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_err(path, err)),
        },
        Err(err) => return Err(io_err(path, err)),
    };
    let modified = meta.modified().map_err(|e| io_err(path, e))?;
    Ok(Some(FileEntry {
        name,
        is_dir: meta.is_dir(),
        size: meta.len(),
        modified: modified.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn ownership_guard_rejects_outside_and_parent_components() {
        let root = PathRoot::local("/data/runs");
        assert!(root.ensure_owned(Path::new("/data/runs/a/b")).is_ok());
        assert!(root.ensure_owned(Path::new("/data/runs")).is_ok());
        assert!(matches!(
            root.ensure_owned(Path::new("/data/other")),
            Err(SyncError::PathOutsideRoot { .. })
        ));
        assert!(matches!(
            root.ensure_owned(Path::new("/data/runs/../other")),
            Err(SyncError::PathOutsideRoot { .. })
        ));
    }

    #[test]
    fn remove_outside_root_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let inside = tmp.path().join("root");
        let outside = tmp.path().join("keep.txt");
        fs::create_dir_all(&inside).unwrap();
        fs::write(&outside, "x").unwrap();

        let root = PathRoot::local(&inside);
        let err = root.remove(&outside).unwrap_err();
        assert!(matches!(err, SyncError::PathOutsideRoot { .. }));
        assert!(outside.exists());
    }

    #[test]
    fn make_dir_is_idempotent_and_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let root = PathRoot::local(tmp.path());
        let deep = tmp.path().join("a").join("b").join("c");
        root.make_dir(&deep).unwrap();
        root.make_dir(&deep).unwrap();
        assert!(deep.is_dir());
    }

    #[test]
    fn remove_handles_files_and_directories() {
        let tmp = TempDir::new().unwrap();
        let root = PathRoot::local(tmp.path());
        let dir = tmp.path().join("d");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested").join("f"), "x").unwrap();
        let file = tmp.path().join("f.txt");
        fs::write(&file, "x").unwrap();

        root.remove(&file).unwrap();
        root.remove(&dir).unwrap();
        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn local_snapshot_classifies_entries() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "0123456789").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        let root = PathRoot::local(tmp.path());

        let snapshot = root.detailed_snapshot(tmp.path()).unwrap();
        let a = snapshot.get("a.txt").unwrap();
        assert!(!a.is_dir);
        assert_eq!(a.size, 10);
        assert!(snapshot.get("sub").unwrap().is_dir);

        let names = root.list_names(tmp.path()).unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["a.txt", "sub"]);
    }

    #[test]
    fn stat_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let root = PathRoot::local(tmp.path());
        assert!(root.stat(&tmp.path().join("nope")).unwrap().is_none());
    }

    #[test]
    fn text_roundtrip_and_missing_read() {
        let tmp = TempDir::new().unwrap();
        let root = PathRoot::local(tmp.path());
        let path = tmp.path().join("note.txt");
        assert_eq!(root.read_text(&path).unwrap(), None);
        root.write_text(&path, "hello").unwrap();
        assert_eq!(root.read_text(&path).unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn archive_lives_next_to_directory() {
        assert_eq!(
            PathRoot::archive_path_for(Path::new("/r/runs/case1")),
            PathBuf::from("/r/runs/case1.tar.gz")
        );
        assert_eq!(
            unarchive_target(Path::new("/r/runs/case1.tar.gz")),
            PathBuf::from("/r/runs/case1")
        );
    }

    #[test]
    fn archive_of_root_itself_is_refused() {
        let tmp = TempDir::new().unwrap();
        let root = PathRoot::local(tmp.path());
        let err = root.archive(tmp.path(), &ArchiveFilter::All).unwrap_err();
        assert!(matches!(err, SyncError::PathOutsideRoot { .. }));
    }

    #[test]
    fn archive_and_unarchive_roundtrip_with_exclude() {
        let tmp = TempDir::new().unwrap();
        let root = PathRoot::local(tmp.path());
        let dir = tmp.path().join("case");
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("keep.txt"), "k").unwrap();
        fs::write(dir.join("wfns"), "big").unwrap();
        fs::write(dir.join("sub").join("wfns"), "big").unwrap();

        let archive = root
            .archive(&dir, &ArchiveFilter::Exclude(vec!["wfns".into()]))
            .unwrap();
        assert!(archive.exists());

        fs::remove_dir_all(&dir).unwrap();
        let target = root.unarchive(&archive, true).unwrap();
        assert_eq!(target, dir);
        assert!(dir.join("keep.txt").exists());
        assert!(dir.join("sub").is_dir());
        assert!(!dir.join("wfns").exists());
        assert!(!dir.join("sub").join("wfns").exists());
    }

    #[test]
    fn failed_command_reports_status_and_stderr() {
        let tmp = TempDir::new().unwrap();
        let root = PathRoot::local(tmp.path());
        let err = root.run_checked("echo oops >&2; exit 7").unwrap_err();
        match err {
            SyncError::Channel(ChannelError::CommandFailed { status, stderr, .. }) => {
                assert_eq!(status, 7);
                assert_eq!(stderr, "oops");
            }
            other => panic!("expected command failure, got {other:?}"),
        }
    }
}
