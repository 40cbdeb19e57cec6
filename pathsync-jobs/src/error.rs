use thiserror::Error;

/// Error surface for scheduler queries, the job cache and submission.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("sync error: {0}")]
    Sync(#[from] pathsync_sync::SyncError),

    #[error("config error: {0}")]
    Config(#[from] pathsync_core::ConfigError),

    /// A history row could not be split into its five columns.
    #[error("cannot parse scheduler report line {line:?}: {reason}")]
    Report { line: String, reason: String },

    /// A submit template references a placeholder that is not provided.
    #[error("submit template {template:?}: {reason}")]
    Template { template: String, reason: String },
}

impl From<pathsync_sync::ChannelError> for JobError {
    fn from(err: pathsync_sync::ChannelError) -> Self {
        JobError::Sync(err.into())
    }
}
