//! pathsync core library: domain types, configuration resolution, errors.
//!
//! Public API surface:
//! - [`types`]: newtypes, listing and scheduler records
//! - [`error`]: [`ConfigError`]
//! - [`config`]: config file load / save and one-pass [`config::resolve`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{ConfigFile, Overrides, SessionConfig};
pub use error::ConfigError;
pub use types::{ClusterName, DirectorySnapshot, FileEntry, JobId, JobRecord, JobState};
