//! Root pairs: one local root mirrored by a remote one, or two local roots.
//!
//! A path under either root maps to the same relative location under the
//! other. Relative paths are taken to be relative to the local (first) root.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::archive::archive_transfer;
use crate::engine::{sync_directory, SyncOptions, SyncReport};
use crate::filter::ArchiveFilter;
use crate::marker::needs_check;
use crate::root::{PathRoot, RemoteHandle};
use crate::transfer::copy_file;
use crate::SyncError;

/// How a directory is moved between roots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum TransferMode {
    /// Diff-based, file by file, with markers.
    #[default]
    Incremental,
    /// One compressed archive, no staleness check.
    Archive,
}

/// What a directory download or upload did.
#[derive(Debug, Clone, Serialize)]
pub enum DirTransfer {
    Incremental(SyncReport),
    Archive { source: PathBuf, target: PathBuf },
    /// Archive mode under `dry_run`: nothing was packed or moved.
    WouldArchive { source: PathBuf, target: PathBuf },
}

/// Swap `from` for `to` at the front of `path`.
fn rebase(path: &Path, from: &Path, to: &Path) -> Option<PathBuf> {
    let rel = path.strip_prefix(from).ok()?;
    if rel.as_os_str().is_empty() {
        Some(to.to_path_buf())
    } else {
        Some(to.join(rel))
    }
}

fn unmapped(path: &Path, first: &Path, second: &Path) -> SyncError {
    SyncError::Unmapped {
        path: path.to_path_buf(),
        first: first.to_path_buf(),
        second: second.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Local + remote
// ---------------------------------------------------------------------------

/// A local root and the remote root it mirrors.
#[derive(Debug, Clone)]
pub struct PathRootPair {
    local: PathRoot,
    remote: PathRoot,
}

impl PathRootPair {
    pub fn new(local: PathRoot, remote: PathRoot) -> Self {
        Self { local, remote }
    }

    pub fn local(&self) -> &PathRoot {
        &self.local
    }

    pub fn remote(&self) -> &PathRoot {
        &self.remote
    }

    /// Point the remote root at a fresh connection. The old channel is left
    /// to whoever else still holds it.
    pub fn reconnect(&mut self, handle: RemoteHandle) {
        self.remote.replace_channel(handle);
    }

    /// `<remote_root>/<tree>` → `<local_root>/<tree>`.
    pub fn local_path(&self, remote_path: &Path) -> Result<PathBuf, SyncError> {
        rebase(remote_path, self.remote.root(), self.local.root())
            .ok_or_else(|| unmapped(remote_path, self.remote.root(), self.local.root()))
    }

    /// `<local_root>/<tree>` → `<remote_root>/<tree>`.
    pub fn remote_path(&self, local_path: &Path) -> Result<PathBuf, SyncError> {
        rebase(local_path, self.local.root(), self.remote.root())
            .ok_or_else(|| unmapped(local_path, self.local.root(), self.remote.root()))
    }

    /// `(local, remote)` for a path under either root.
    pub fn resolve(&self, arb: &Path) -> Result<(PathBuf, PathBuf), SyncError> {
        let arb = if arb.is_relative() {
            self.local.root().join(arb)
        } else {
            arb.to_path_buf()
        };
        if arb.starts_with(self.local.root()) {
            let remote = self.remote_path(&arb)?;
            return Ok((arb, remote));
        }
        if arb.starts_with(self.remote.root()) {
            let local = self.local_path(&arb)?;
            return Ok((local, arb));
        }
        Err(unmapped(&arb, self.local.root(), self.remote.root()))
    }

    /// Copy one remote file down, creating local parents. Returns the local path.
    pub fn download(&self, arb: &Path) -> Result<PathBuf, SyncError> {
        let (local, remote) = self.resolve(arb)?;
        if let Some(parent) = local.parent() {
            self.local.make_dir(parent)?;
        }
        copy_file(&self.remote, &remote, &self.local, &local)?;
        Ok(local)
    }

    /// Copy one local file up, creating remote parents. Returns the remote path.
    pub fn upload(&self, arb: &Path) -> Result<PathBuf, SyncError> {
        let (local, remote) = self.resolve(arb)?;
        if let Some(parent) = remote.parent() {
            self.remote.make_dir(parent)?;
        }
        copy_file(&self.local, &local, &self.remote, &remote)?;
        Ok(remote)
    }

    /// Upload the named files of one directory, unconditionally.
    pub fn upload_files(&self, arb_dir: &Path, names: &[String]) -> Result<(), SyncError> {
        let (local_dir, remote_dir) = self.resolve(arb_dir)?;
        self.remote.make_dir(&remote_dir)?;
        for name in names {
            copy_file(
                &self.local,
                &local_dir.join(name),
                &self.remote,
                &remote_dir.join(name),
            )?;
        }
        Ok(())
    }

    /// Bring a local directory up to date with its remote counterpart.
    pub fn update_dir_contents(
        &self,
        arb_dir: &Path,
        options: &SyncOptions,
    ) -> Result<SyncReport, SyncError> {
        let (local_dir, remote_dir) = self.resolve(arb_dir)?;
        sync_directory(&self.remote, &remote_dir, &self.local, &local_dir, options)
    }

    pub fn download_dir(
        &self,
        arb_dir: &Path,
        mode: TransferMode,
        options: &SyncOptions,
    ) -> Result<DirTransfer, SyncError> {
        let (local_dir, remote_dir) = self.resolve(arb_dir)?;
        transfer_dir(
            (&self.remote, &remote_dir),
            (&self.local, &local_dir),
            mode,
            options,
        )
    }

    pub fn upload_dir(
        &self,
        arb_dir: &Path,
        mode: TransferMode,
        options: &SyncOptions,
    ) -> Result<DirTransfer, SyncError> {
        let (local_dir, remote_dir) = self.resolve(arb_dir)?;
        transfer_dir(
            (&self.local, &local_dir),
            (&self.remote, &remote_dir),
            mode,
            options,
        )
    }

    /// Marker-based probe on the local copy of `arb_dir`.
    pub fn needs_check(
        &self,
        arb_dir: &Path,
        max_age: Duration,
        force: bool,
    ) -> Result<bool, SyncError> {
        let (local_dir, _) = self.resolve(arb_dir)?;
        needs_check(&self.local, &local_dir, max_age, force)
    }
}

fn transfer_dir(
    (source, source_dir): (&PathRoot, &Path),
    (dest, dest_dir): (&PathRoot, &Path),
    mode: TransferMode,
    options: &SyncOptions,
) -> Result<DirTransfer, SyncError> {
    match mode {
        TransferMode::Incremental => Ok(DirTransfer::Incremental(sync_directory(
            source, source_dir, dest, dest_dir, options,
        )?)),
        TransferMode::Archive if options.dry_run => {
            tracing::info!(
                "would archive {} --> {}",
                source_dir.display(),
                dest_dir.display()
            );
            Ok(DirTransfer::WouldArchive {
                source: source_dir.to_path_buf(),
                target: dest_dir.to_path_buf(),
            })
        }
        TransferMode::Archive => {
            let target = archive_transfer(
                source,
                source_dir,
                dest,
                dest_dir,
                &ArchiveFilter::from(&options.filter),
                true,
            )?;
            Ok(DirTransfer::Archive {
                source: source_dir.to_path_buf(),
                target,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Two local roots
// ---------------------------------------------------------------------------

/// Both sides of a [`LocalPathRootPair::sync_dir_contents`] call.
#[derive(Debug, Clone, Serialize)]
pub struct MirrorReport {
    /// first → second
    pub forward: SyncReport,
    /// second → first
    pub backward: SyncReport,
}

/// Two local roots kept in step by two one-directional passes.
///
/// The passes are independent: a file both sides changed is not merged. If
/// the sizes differ the first root's copy wins in the forward pass; if only
/// the times differ the newer copy wins.
#[derive(Debug, Clone)]
pub struct LocalPathRootPair {
    first: PathRoot,
    second: PathRoot,
}

impl LocalPathRootPair {
    pub fn new(first: PathRoot, second: PathRoot) -> Self {
        Self { first, second }
    }

    pub fn from_paths(first: impl Into<PathBuf>, second: impl Into<PathBuf>) -> Self {
        Self::new(PathRoot::local(first), PathRoot::local(second))
    }

    pub fn first(&self) -> &PathRoot {
        &self.first
    }

    pub fn second(&self) -> &PathRoot {
        &self.second
    }

    /// `<second_root>/<tree>` → `<first_root>/<tree>`.
    pub fn first_path(&self, second_path: &Path) -> Result<PathBuf, SyncError> {
        rebase(second_path, self.second.root(), self.first.root())
            .ok_or_else(|| unmapped(second_path, self.second.root(), self.first.root()))
    }

    /// `<first_root>/<tree>` → `<second_root>/<tree>`.
    pub fn second_path(&self, first_path: &Path) -> Result<PathBuf, SyncError> {
        rebase(first_path, self.first.root(), self.second.root())
            .ok_or_else(|| unmapped(first_path, self.first.root(), self.second.root()))
    }

    /// Copy one file from the first root to its place under the second.
    pub fn upload(&self, first_file: &Path) -> Result<PathBuf, SyncError> {
        let target = self.second_path(first_file)?;
        if let Some(parent) = target.parent() {
            self.second.make_dir(parent)?;
        }
        copy_file(&self.first, first_file, &self.second, &target)?;
        Ok(target)
    }

    /// Copy one file from the second root to its place under the first.
    pub fn download(&self, second_file: &Path) -> Result<PathBuf, SyncError> {
        let target = self.first_path(second_file)?;
        if let Some(parent) = target.parent() {
            self.first.make_dir(parent)?;
        }
        copy_file(&self.second, second_file, &self.first, &target)?;
        Ok(target)
    }

    /// Sync `dir1` (under the first root) with `dir2` (under the second root,
    /// defaulting to the mapped location of `dir1`) in both directions.
    pub fn sync_dir_contents(
        &self,
        dir1: &Path,
        dir2: Option<&Path>,
        options: &SyncOptions,
    ) -> Result<MirrorReport, SyncError> {
        let dir1 = under_root(&self.first, dir1);
        let dir2 = match dir2 {
            Some(dir) => under_root(&self.second, dir),
            None => self.second_path(&dir1)?,
        };
        self.first.ensure_owned(&dir1)?;
        self.second.ensure_owned(&dir2)?;

        let forward = sync_directory(&self.first, &dir1, &self.second, &dir2, options)?;
        let backward = sync_directory(&self.second, &dir2, &self.first, &dir1, options)?;
        Ok(MirrorReport { forward, backward })
    }
}

/// A relative `dir` is taken from the root, unless it already names it.
fn under_root(root: &PathRoot, dir: &Path) -> PathBuf {
    if dir.is_relative() && !dir.starts_with(root.root()) {
        root.root().join(dir)
    } else {
        dir.to_path_buf()
    }
}
