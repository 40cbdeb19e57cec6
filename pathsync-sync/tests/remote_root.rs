//! Remote roots exercised through a local shell, so the `find`, `ls`, `tar`
//! and `printf` command paths run for real.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use pathsync_sync::{
    archive_transfer, marker::marker_path, sync_directory, ArchiveFilter, ChannelError,
    CommandOutput, DirTransfer, ExecChannel, LocalCopy, LocalShell, PathRoot, PathRootPair,
    RemoteHandle, SyncError, SyncOptions, TransferMode,
};
use tempfile::TempDir;

/// Runs commands locally, records them, and fails any containing `fail_on`.
#[derive(Debug, Default)]
struct RecordingShell {
    fail_on: Option<String>,
    log: Mutex<Vec<String>>,
}

impl RecordingShell {
    fn failing_on(pattern: &str) -> Self {
        Self {
            fail_on: Some(pattern.to_string()),
            log: Mutex::new(Vec::new()),
        }
    }

    fn commands(&self) -> Vec<String> {
        self.log.lock().expect("log lock").clone()
    }
}

impl ExecChannel for RecordingShell {
    fn execute(&self, command: &str) -> Result<CommandOutput, ChannelError> {
        self.log.lock().expect("log lock").push(command.to_string());
        if let Some(pattern) = &self.fail_on {
            if command.contains(pattern.as_str()) {
                return Err(ChannelError::Connection {
                    host: "fake".to_string(),
                    detail: "connection reset".to_string(),
                });
            }
        }
        LocalShell.execute(command)
    }
}

/// Always answers with the same stdout.
#[derive(Debug)]
struct CannedShell(String);

impl ExecChannel for CannedShell {
    fn execute(&self, _command: &str) -> Result<CommandOutput, ChannelError> {
        Ok(CommandOutput {
            stdout: self.0.clone(),
            stderr: String::new(),
            status: Some(0),
        })
    }
}

fn remote_root(root: &Path, exec: Arc<dyn ExecChannel>) -> PathRoot {
    PathRoot::remote(root, RemoteHandle::new("fake", exec, Arc::new(LocalCopy)))
}

fn fixture(tmp: &TempDir) -> (PathBuf, PathBuf) {
    let local = tmp.path().join("local");
    let remote = tmp.path().join("remote");
    fs::create_dir_all(local.join("case").join("sub")).expect("local tree");
    fs::create_dir_all(&remote).expect("remote root");
    fs::write(local.join("case").join("in.dat"), "input-data").expect("in");
    fs::write(local.join("case").join("sub").join("deep.dat"), "deep").expect("deep");
    fs::write(local.join("case").join("file with spaces.txt"), "s").expect("spaces");
    (local, remote)
}

#[test]
fn remote_snapshot_matches_local_snapshot() {
    let tmp = TempDir::new().expect("tmp");
    let (local, _) = fixture(&tmp);
    let dir = local.join("case");

    let via_fs = PathRoot::local(&local)
        .detailed_snapshot(&dir)
        .expect("local snapshot");
    let via_find = remote_root(&local, Arc::new(LocalShell))
        .detailed_snapshot(&dir)
        .expect("remote snapshot");

    assert_eq!(via_fs.len(), via_find.len());
    for entry in via_fs.iter() {
        let other = via_find.get(&entry.name).expect("same names");
        assert_eq!(entry.is_dir, other.is_dir, "{}", entry.name);
        if !entry.is_dir {
            assert_eq!(entry.size, other.size, "{}", entry.name);
        }
        assert_eq!(
            entry.modified.timestamp(),
            other.modified.timestamp(),
            "{}",
            entry.name
        );
    }
}

#[test]
fn remote_probes_and_text_files() {
    let tmp = TempDir::new().expect("tmp");
    let (_, remote) = fixture(&tmp);
    let root = remote_root(&remote, Arc::new(LocalShell));
    let note = remote.join("note.txt");

    assert!(root.exists(&remote).expect("exists"));
    assert!(root.is_dir(&remote).expect("is_dir"));
    assert!(!root.exists(&note).expect("missing"));
    assert!(root.stat(&note).expect("stat").is_none());
    assert_eq!(root.read_text(&note).expect("read missing"), None);

    root.write_text(&note, "it's 100% here").expect("write");
    assert_eq!(
        root.read_text(&note).expect("read").as_deref(),
        Some("it's 100% here")
    );
    assert_eq!(root.stat(&note).expect("stat").expect("present").size, 14);

    let names = root.list_names(&remote).expect("names");
    assert!(names.contains("note.txt"));
    assert!(!names.contains("."));

    root.remove(&note).expect("remove");
    assert!(!note.exists());
}

#[test]
fn listing_a_missing_remote_directory_fails() {
    let tmp = TempDir::new().expect("tmp");
    let root = remote_root(tmp.path(), Arc::new(LocalShell));
    let err = root
        .detailed_snapshot(&tmp.path().join("absent"))
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Channel(ChannelError::CommandFailed { .. })
    ));
}

#[test]
fn malformed_listing_names_the_entry() {
    let root = remote_root(
        Path::new("/r"),
        Arc::new(CannedShell("f\tbig\t1700000000.0\tresult.dat\0".to_string())),
    );
    let err = root.detailed_snapshot(Path::new("/r/x")).unwrap_err();
    match err {
        SyncError::ListingParse { entry, record, .. } => {
            assert_eq!(entry, "result.dat");
            assert!(record.contains("big"));
        }
        other => panic!("expected listing parse error, got {other:?}"),
    }
}

#[test]
fn upload_and_download_through_pair() {
    let tmp = TempDir::new().expect("tmp");
    let (local, remote) = fixture(&tmp);
    let shell = Arc::new(RecordingShell::default());
    let pair = PathRootPair::new(
        PathRoot::local(&local),
        remote_root(&remote, shell.clone()),
    );

    let outcome = pair
        .upload_dir(
            Path::new("case"),
            TransferMode::Incremental,
            &SyncOptions::default(),
        )
        .expect("upload");
    let DirTransfer::Incremental(report) = outcome else {
        panic!("expected an incremental transfer");
    };
    assert_eq!(report.transferred(), 3);
    assert!(remote.join("case").join("sub").join("deep.dat").exists());
    assert!(marker_path(&remote.join("case")).exists());
    assert!(shell.commands().iter().any(|c| c.starts_with("mkdir -p")));

    fs::write(remote.join("case").join("out.log"), "done").expect("result");
    let report = pair
        .update_dir_contents(&remote.join("case"), &SyncOptions::default())
        .expect("download");
    assert_eq!(report.transferred(), 1);
    assert_eq!(
        fs::read_to_string(local.join("case").join("out.log")).unwrap(),
        "done"
    );

    let single = pair
        .download(&remote.join("case").join("in.dat"))
        .expect("single download");
    assert_eq!(single, local.join("case").join("in.dat"));
}

#[test]
fn failure_mid_walk_keeps_parent_marker() {
    let tmp = TempDir::new().expect("tmp");
    let (local, remote) = fixture(&tmp);
    let shell = Arc::new(RecordingShell::failing_on("/sub"));
    let dest = remote_root(&remote, shell);

    let err = sync_directory(
        &PathRoot::local(&local),
        &local.join("case"),
        &dest,
        &remote.join("case"),
        &SyncOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        SyncError::Channel(ChannelError::Connection { .. })
    ));
    assert!(marker_path(&remote.join("case")).exists());
    assert!(remote.join("case").join("in.dat").exists());
    assert!(!remote.join("case").join("sub").exists());
}

#[test]
fn archive_transfer_to_remote_and_back() {
    let tmp = TempDir::new().expect("tmp");
    let (local, remote) = fixture(&tmp);
    let local_root = PathRoot::local(&local);
    let remote_root = remote_root(&remote, Arc::new(LocalShell));

    archive_transfer(
        &local_root,
        &local.join("case"),
        &remote_root,
        &remote.join("case"),
        &ArchiveFilter::Include(vec!["in.dat".to_string()]),
        true,
    )
    .expect("upload archive");
    assert!(remote.join("case").join("in.dat").exists());
    assert!(!remote.join("case").join("sub").join("deep.dat").exists());
    assert!(!local.join("case.tar.gz").exists());
    assert!(!remote.join("case.tar.gz").exists());

    fs::write(remote.join("case").join("in.dat"), "changed-on-remote").expect("edit");
    archive_transfer(
        &remote_root,
        &remote.join("case"),
        &local_root,
        &local.join("case"),
        &ArchiveFilter::All,
        true,
    )
    .expect("download archive");
    assert_eq!(
        fs::read_to_string(local.join("case").join("in.dat")).unwrap(),
        "changed-on-remote"
    );
    assert!(local.join("case").join("sub").join("deep.dat").exists());
}
