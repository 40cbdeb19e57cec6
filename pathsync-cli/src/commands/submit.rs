//! `pathsync submit`: guarded upload-and-submit of one directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use pathsync_jobs::{SubmitOptions, SubmitOutcome};
use pathsync_sync::TransferMode;

use super::transfer::print_outcome;
use super::ConnectionArgs;

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Directory under either root.
    pub path: PathBuf,

    /// Resubmit a completed job, or cancel and replace a pending one.
    #[arg(long)]
    pub force: bool,

    /// Do not pull results of a timed-out job before uploading.
    #[arg(long)]
    pub no_refresh: bool,

    /// Upload file by file instead of as one archive.
    #[arg(long)]
    pub incremental: bool,

    /// Lookback window for the job state check, in days.
    #[arg(long)]
    pub days: Option<u32>,
}

impl SubmitArgs {
    pub fn run(self, connection: &ConnectionArgs) -> Result<()> {
        let mut session = connection.connect()?;
        let options = SubmitOptions {
            force: self.force,
            refresh_on_timeout: !self.no_refresh,
            mode: if self.incremental {
                TransferMode::Incremental
            } else {
                TransferMode::Archive
            },
            window_days: self.days.unwrap_or(session.config().lookback_days),
        };

        let outcome = session
            .submit_if_needed(&self.path, &options)
            .with_context(|| format!("submission of {} failed", self.path.display()))?;

        let label = self.path.display().to_string();
        match outcome {
            SubmitOutcome::Skipped { reason } => {
                println!("{} {label}: {} ({reason})", "■".yellow().bold(), reason.state());
            }
            SubmitOutcome::Submitted {
                previous,
                cancelled,
                refreshed,
                upload,
                output,
            } => {
                if let Some(state) = previous {
                    println!("previous job state: {state}");
                }
                if let Some(job_id) = cancelled {
                    println!("cancelled pending job {job_id}");
                }
                if let Some(refresh) = &refreshed {
                    print_outcome(&format!("{label} (refresh)"), refresh);
                }
                print_outcome(&label, &upload);
                println!("{} {}", "✓".green(), output.trim());
            }
        }
        Ok(())
    }
}
