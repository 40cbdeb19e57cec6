//! Subcommands and the flags they share.

pub mod check;
pub mod config;
pub mod jobs;
pub mod mirror;
pub mod submit;
pub mod transfer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use pathsync_core::{config as core_config, ClusterName, Overrides, SessionConfig};
use pathsync_jobs::Session;
use pathsync_sync::{NameFilter, SyncOptions, SyncReport};

/// Connection settings; each one overrides the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Cluster profile from ~/.pathsync/config.yaml.
    #[arg(long, short = 'c', global = true)]
    pub cluster: Option<String>,

    /// SSH hostname.
    #[arg(long = "host", global = true)]
    pub hostname: Option<String>,

    /// SSH and scheduler username.
    #[arg(long = "user", global = true)]
    pub username: Option<String>,

    #[arg(long, global = true, value_name = "DIR")]
    pub local_root: Option<PathBuf>,

    #[arg(long, global = true, value_name = "DIR")]
    pub remote_root: Option<PathBuf>,

    /// Skip agent authentication and log in interactively.
    #[arg(long, global = true)]
    pub no_agent: bool,

    /// SSH keepalive interval in seconds; 0 disables it.
    #[arg(long, global = true, value_name = "SECS")]
    pub keepalive: Option<u64>,
}

impl ConnectionArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            local_root: self.local_root.clone(),
            remote_root: self.remote_root.clone(),
            hostname: self.hostname.clone(),
            username: self.username.clone(),
            keepalive_secs: self.keepalive,
            try_agent: self.no_agent.then_some(false),
        }
    }

    pub fn resolve(&self) -> Result<SessionConfig> {
        let file = core_config::load().context("failed to load ~/.pathsync/config.yaml")?;
        let cluster = self.cluster.clone().map(ClusterName::from);
        core_config::resolve(&file, &self.overrides(), cluster.as_ref())
            .context("incomplete connection settings")
    }

    pub fn connect(&self) -> Result<Session> {
        let config = self.resolve()?;
        let host = config.hostname.clone();
        tracing::debug!(host = %host, user = %config.username, "opening session");
        Session::connect(config).with_context(|| format!("failed to connect to {host}"))
    }
}

/// Name filters and traversal switches shared by the sync commands.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// File name to skip, in addition to the configured list. Repeatable.
    #[arg(long, value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Only transfer files with these names. Repeatable.
    #[arg(long, value_name = "NAME")]
    pub include: Vec<String>,

    /// Directory name never descended into. Repeatable.
    #[arg(long = "exclude-dir", value_name = "NAME")]
    pub exclude_dirs: Vec<String>,

    /// Ignore the configured exclude list.
    #[arg(long)]
    pub no_default_excludes: bool,

    /// Transfer every file, stale or not.
    #[arg(long)]
    pub force: bool,

    #[arg(long)]
    pub no_recursive: bool,

    /// Show what would be transferred without touching anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl FilterArgs {
    pub fn sync_options(&self, configured_excludes: &[String]) -> SyncOptions {
        let mut exclude = if self.no_default_excludes {
            Vec::new()
        } else {
            configured_excludes.to_vec()
        };
        exclude.extend(self.exclude.iter().cloned());
        SyncOptions {
            filter: NameFilter {
                exclude,
                include: (!self.include.is_empty()).then(|| self.include.clone()),
            },
            exclude_dirs: self.exclude_dirs.clone(),
            recursive: !self.no_recursive,
            force_full: self.force,
            dry_run: self.dry_run,
        }
    }
}

pub fn print_report(label: &str, report: &SyncReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let count = report.transferred();
    if count == 0 {
        println!(
            "{prefix}{} {label}: nothing to do ({} directories checked)",
            "✓".green(),
            report.directories.len()
        );
        return;
    }
    println!(
        "{prefix}{} {label}: {count} file(s) across {} directories",
        "✓".green(),
        report.directories.len()
    );
    let marker = if report.dry_run { "~" } else { "✎" };
    for (from, to) in report.transfers() {
        println!("  {marker}  {} --> {}", from.display(), to.display());
    }
}
