//! Session configuration: on-disk profiles and one-pass resolution.
//!
//! # Storage layout
//!
//! ```text
//! ~/.pathsync/
//!   config.yaml   (mode 0600)
//! ```
//!
//! # Resolution precedence
//!
//! Every setting is resolved exactly once, when a session is built:
//!
//! 1. explicit override (CLI flag / caller argument)
//! 2. the selected cluster profile
//! 3. the file's `defaults` section
//! 4. built-in default (only for settings that have one)
//!
//! A required setting still unset after step 4 is [`ConfigError::Missing`].
//!
//! # API pattern
//!
//! As with every file-backed store in this workspace, each function has an
//! `_at(home, …)` form used by tests and a wrapper that derives `home` from
//! `dirs::home_dir()`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::ClusterName;

pub const DEFAULT_KEEPALIVE_SECS: u64 = 60;
pub const DEFAULT_JOB_CACHE_REFRESH_SECS: u64 = 60;
pub const DEFAULT_LOOKBACK_DAYS: u32 = 3;
pub const DEFAULT_SCRIPT_NAME: &str = "psubmit.sh";
pub const DEFAULT_SUBMIT_TEMPLATE: &str = "cd {path}; sbatch {script_name}";
pub const DEFAULT_EXCLUDE_NAMES: &[&str] = &[
    "wfns",
    "n_up",
    "n_dn",
    "fluidState",
    "out_wforce.logx",
    "force",
];

// ---------------------------------------------------------------------------
// 1. File schema
// ---------------------------------------------------------------------------

/// Root of `~/.pathsync/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub clusters: BTreeMap<ClusterName, ClusterProfile>,
}

/// Settings applied to every session unless a profile or override wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Defaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keepalive_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_cache_refresh_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookback_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_names: Option<Vec<String>>,
}

/// Per-cluster connection profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClusterProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Explicit values supplied by the caller; each one beats every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub local_root: Option<PathBuf>,
    pub remote_root: Option<PathBuf>,
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub keepalive_secs: Option<u64>,
    pub try_agent: Option<bool>,
}

/// Fully resolved settings for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionConfig {
    pub cluster: Option<ClusterName>,
    pub local_root: PathBuf,
    pub remote_root: PathBuf,
    pub hostname: String,
    pub username: String,
    /// `None` disables the SSH keepalive.
    pub keepalive: Option<Duration>,
    pub try_agent: bool,
    pub job_cache_refresh: Duration,
    pub lookback_days: u32,
    pub submit_template: String,
    pub script_name: String,
    pub exclude_names: Vec<String>,
}

// ---------------------------------------------------------------------------
// 2. Resolution
// ---------------------------------------------------------------------------

/// Resolve a [`SessionConfig`] in one pass (see module docs for precedence).
pub fn resolve(
    file: &ConfigFile,
    overrides: &Overrides,
    cluster: Option<&ClusterName>,
) -> Result<SessionConfig, ConfigError> {
    let profile = match cluster {
        Some(name) => Some(file.clusters.get(name).ok_or_else(|| {
            ConfigError::UnknownCluster {
                cluster: name.0.clone(),
                known: known_clusters(file),
            }
        })?),
        None => None,
    };
    let local_root = overrides
        .local_root
        .clone()
        .or_else(|| profile.and_then(|p| p.local_root.clone()))
        .ok_or(ConfigError::Missing { field: "local_root" })?;
    let remote_root = overrides
        .remote_root
        .clone()
        .or_else(|| profile.and_then(|p| p.remote_root.clone()))
        .ok_or(ConfigError::Missing { field: "remote_root" })?;
    let hostname = overrides
        .hostname
        .clone()
        .or_else(|| profile.and_then(|p| p.hostname.clone()))
        .or_else(|| file.defaults.hostname.clone())
        .ok_or(ConfigError::Missing { field: "hostname" })?;
    let username = overrides
        .username
        .clone()
        .or_else(|| profile.and_then(|p| p.username.clone()))
        .or_else(|| file.defaults.username.clone())
        .ok_or(ConfigError::Missing { field: "username" })?;

    let keepalive_secs = overrides
        .keepalive_secs
        .or(file.defaults.keepalive_secs)
        .unwrap_or(DEFAULT_KEEPALIVE_SECS);
    let refresh_secs = file
        .defaults
        .job_cache_refresh_secs
        .unwrap_or(DEFAULT_JOB_CACHE_REFRESH_SECS);

    Ok(SessionConfig {
        cluster: cluster.cloned(),
        local_root,
        remote_root,
        hostname,
        username,
        keepalive: (keepalive_secs > 0).then(|| Duration::from_secs(keepalive_secs)),
        try_agent: overrides.try_agent.unwrap_or(true),
        job_cache_refresh: Duration::from_secs(refresh_secs),
        lookback_days: file.defaults.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
        submit_template: file
            .defaults
            .submit_template
            .clone()
            .unwrap_or_else(|| DEFAULT_SUBMIT_TEMPLATE.to_string()),
        script_name: file
            .defaults
            .script_name
            .clone()
            .unwrap_or_else(|| DEFAULT_SCRIPT_NAME.to_string()),
        exclude_names: file
            .defaults
            .exclude_names
            .clone()
            .unwrap_or_else(|| DEFAULT_EXCLUDE_NAMES.iter().map(|s| s.to_string()).collect()),
    })
}

fn known_clusters(file: &ConfigFile) -> String {
    if file.clusters.is_empty() {
        return "none".to_string();
    }
    file.clusters
        .keys()
        .map(|c| c.0.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// 3. Load / save
// ---------------------------------------------------------------------------

/// `<home>/.pathsync/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".pathsync").join("config.yaml")
}

/// Load the config file. A missing file is an empty config, not an error.
pub fn load_at(home: &Path) -> Result<ConfigFile, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<ConfigFile, ConfigError> {
    load_at(&home()?)
}

/// Atomically save the config file.
///
/// Write flow: serialize → `config.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, file: &ConfigFile) -> Result<(), ConfigError> {
    let path = config_path_at(home);
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            set_dir_permissions(dir)?;
        }
    }
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(file)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(file: &ConfigFile) -> Result<(), ConfigError> {
    save_at(&home()?, file)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
