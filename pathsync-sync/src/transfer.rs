//! Single-file moves between two roots.

use std::path::Path;

use crate::channel::{LocalCopy, TransferChannel};
use crate::listing::quote;
use crate::root::PathRoot;
use crate::SyncError;

/// Copy `src` on `source` to `dst` on `dest`, overwriting.
///
/// Remote-to-remote copies only work when both roots share one channel; the
/// file is then copied on the far side with `cp -p`.
pub fn copy_file(
    source: &PathRoot,
    src: &Path,
    dest: &PathRoot,
    dst: &Path,
) -> Result<(), SyncError> {
    dest.ensure_owned(dst)?;
    tracing::info!("{} --> {}", src.display(), dst.display());

    match (source.remote_handle(), dest.remote_handle()) {
        (None, None) => LocalCopy.send(src, dst)?,
        (Some(from), None) => from.transfer.fetch(src, dst)?,
        (None, Some(to)) => to.transfer.send(src, dst)?,
        (Some(from), Some(to)) if from.same_channel(to) => {
            dest.run_checked(&format!("cp -p -- {} {}", quote(src), quote(dst)))?;
        }
        (Some(_), Some(_)) => {
            return Err(SyncError::UnsupportedTransfer {
                from: src.to_path_buf(),
                to: dst.to_path_buf(),
                reason: "remote roots on different connections",
            })
        }
    }
    Ok(())
}
