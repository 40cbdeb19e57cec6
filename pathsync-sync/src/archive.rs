//! Whole-directory transfer through a single compressed archive.
//!
//! No staleness check: everything that passes the filter is shipped, and on
//! the destination it overwrites (or, without `overwrite`, fills in) the
//! existing tree. Both archive copies are removed whatever happens, so the
//! transfer refuses to start if either archive path is already taken. Sync
//! markers are not shipped.

use std::path::{Path, PathBuf};

use crate::filter::ArchiveFilter;
use crate::root::PathRoot;
use crate::transfer::copy_file;
use crate::SyncError;

/// Ship `src_dir` on `source` to `dest_dir` on `dest` as one archive.
///
/// Returns the directory the archive was expanded into, which is `dest_dir`.
pub fn archive_transfer(
    source: &PathRoot,
    src_dir: &Path,
    dest: &PathRoot,
    dest_dir: &Path,
    filter: &ArchiveFilter,
    overwrite: bool,
) -> Result<PathBuf, SyncError> {
    let dest_archive = PathRoot::archive_path_for(dest_dir);
    dest.ensure_owned(&dest_archive)?;
    dest.ensure_vacant(&dest_archive)?;

    let src_archive = match source.archive(src_dir, filter) {
        Ok(path) => path,
        Err(err @ SyncError::ArchiveExists { .. }) => return Err(err),
        Err(err) => {
            let partial = PathRoot::archive_path_for(src_dir);
            if matches!(source.exists(&partial), Ok(true)) {
                if let Err(cleanup_err) = source.remove(&partial) {
                    tracing::warn!("archive cleanup failed: {cleanup_err}");
                }
            }
            return Err(err);
        }
    };
    tracing::info!("archived {} into {}", src_dir.display(), src_archive.display());

    let result = ship(source, &src_archive, dest, &dest_archive, overwrite);

    let src_cleanup = source.remove(&src_archive);
    let dest_cleanup = if dest.exists(&dest_archive).unwrap_or(true) {
        dest.remove(&dest_archive)
    } else {
        Ok(())
    };

    match result {
        Ok(target) => {
            src_cleanup?;
            dest_cleanup?;
            Ok(target)
        }
        Err(err) => {
            for cleanup in [src_cleanup, dest_cleanup] {
                if let Err(cleanup_err) = cleanup {
                    tracing::warn!("archive cleanup failed: {cleanup_err}");
                }
            }
            Err(err)
        }
    }
}

fn ship(
    source: &PathRoot,
    src_archive: &Path,
    dest: &PathRoot,
    dest_archive: &Path,
    overwrite: bool,
) -> Result<PathBuf, SyncError> {
    if let Some(parent) = dest_archive.parent() {
        dest.make_dir(parent)?;
    }
    copy_file(source, src_archive, dest, dest_archive)?;
    let target = dest.unarchive(dest_archive, overwrite)?;
    tracing::info!("expanded {} into {}", dest_archive.display(), target.display());
    Ok(target)
}
