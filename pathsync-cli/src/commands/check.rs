//! `pathsync check`: is a local directory due for a sync?

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use pathsync_sync::{needs_check, read_marker, PathRoot};

const SECS_PER_DAY: f64 = 86_400.0;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Local directory holding a `last_updated.txt` marker.
    pub path: PathBuf,

    /// Maximum marker age before the directory is due, in days.
    #[arg(long, value_name = "DAYS")]
    pub max_age_days: f64,

    /// Always report the directory as due.
    #[arg(long)]
    pub force: bool,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let max_age = Duration::try_from_secs_f64(self.max_age_days * SECS_PER_DAY)
            .context("--max-age-days must be a non-negative number")?;
        let root = PathRoot::local(&self.path);
        let due = needs_check(&root, &self.path, max_age, self.force)
            .with_context(|| format!("failed to read marker in {}", self.path.display()))?;
        let stamped = read_marker(&root, &self.path)?;

        let last = stamped
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        if due {
            println!("{} {} is due (last sync: {last})", "■".yellow().bold(), self.path.display());
        } else {
            println!("{} {} is current (last sync: {last})", "■".green().bold(), self.path.display());
        }
        Ok(())
    }
}
