//! Error types for pathsync-sync.

use std::path::PathBuf;

use thiserror::Error;

pub use crate::channel::ChannelError;

/// All errors that can arise from root operations and sync passes.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A mutating operation targeted a path its root does not own.
    /// Raised before anything is executed.
    #[error("{path} is not under root {root}")]
    PathOutsideRoot { path: PathBuf, root: PathBuf },

    /// Execution or transfer channel failure.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A structured listing record could not be decomposed.
    #[error("cannot parse listing entry '{entry}': {reason} (record: {record:?})")]
    ListingParse {
        entry: String,
        record: String,
        reason: String,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A path handed to a pair is under neither of its roots.
    #[error("{path} is not under {first} or {second}")]
    Unmapped {
        path: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    /// The two roots have no way to move a file between them.
    #[error("cannot transfer {from} -> {to}: {reason}")]
    UnsupportedTransfer {
        from: PathBuf,
        to: PathBuf,
        reason: &'static str,
    },

    /// The archive path next to a directory is already taken.
    #[error("{path} already exists; move it aside before an archive transfer")]
    ArchiveExists { path: PathBuf },

    /// A marker file exists but does not hold an epoch timestamp.
    #[error("marker file {path} holds no timestamp: {content:?}")]
    Marker { path: PathBuf, content: String },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
