//! # pathsync-sync
//!
//! Staleness-aware directory sync between filesystem roots that may only be
//! reachable through a command channel.
//!
//! Build a [`PathRoot`] per side, then call [`sync_directory`] for a
//! diff-based pass or [`archive_transfer`] to ship a whole tree at once.
//! [`PathRootPair`] and [`LocalPathRootPair`] wrap both behind path mapping.

pub mod archive;
pub mod channel;
pub mod engine;
pub mod error;
pub mod filter;
pub mod listing;
pub mod marker;
pub mod pair;
pub mod plan;
pub mod root;
pub mod transfer;

pub use archive::archive_transfer;
pub use channel::{
    connect, ChannelError, CommandOutput, ExecChannel, LocalCopy, LocalShell, ScpTransfer,
    SshChannel, SshOptions, TransferChannel,
};
pub use engine::{sync_directory, DirectoryOutcome, SyncOptions, SyncReport};
pub use error::SyncError;
pub use filter::{ArchiveFilter, NameFilter};
pub use marker::{needs_check, read_marker, write_marker, MARKER_FILE_NAME};
pub use pair::{DirTransfer, LocalPathRootPair, MirrorReport, PathRootPair, TransferMode};
pub use plan::{build_plan, is_stale, SyncPlan};
pub use root::{PathRoot, RemoteHandle};
pub use transfer::copy_file;
