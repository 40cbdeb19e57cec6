//! Error types for pathsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading, saving or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, disk full, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.pathsync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// A cluster was named but has no profile in the config file.
    #[error("cluster '{cluster}' not found in config (known: {known})")]
    UnknownCluster { cluster: String, known: String },

    /// A required setting was given neither explicitly, by a cluster profile,
    /// nor by the file defaults.
    #[error("{field} must be provided explicitly, by a cluster profile, or in config defaults")]
    Missing { field: &'static str },
}
