//! `pathsync download` / `pathsync upload`: move a directory or file
//! between the local and remote roots.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use pathsync_sync::{DirTransfer, TransferMode};

use super::{print_report, ConnectionArgs, FilterArgs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    /// Directory or file under either root; relative paths are taken from
    /// the local root.
    pub path: PathBuf,

    /// Ship the directory as one compressed archive instead of diffing it.
    #[arg(long)]
    pub archive: bool,

    /// Treat `path` as a single file.
    #[arg(long, conflicts_with = "archive")]
    pub file: bool,

    #[command(flatten)]
    pub filter: FilterArgs,
}

impl TransferArgs {
    pub fn run(self, connection: &ConnectionArgs, direction: Direction) -> Result<()> {
        let session = connection.connect()?;
        let pair = session.pair();

        if self.file {
            let target = match direction {
                Direction::Download => pair.download(&self.path),
                Direction::Upload => pair.upload(&self.path),
            }
            .with_context(|| format!("failed to transfer {}", self.path.display()))?;
            println!("{} {}", "✓".green(), target.display());
            return Ok(());
        }

        let mode = if self.archive {
            TransferMode::Archive
        } else {
            TransferMode::Incremental
        };
        let options = self.filter.sync_options(&session.config().exclude_names);
        let outcome = match direction {
            Direction::Download => pair.download_dir(&self.path, mode, &options),
            Direction::Upload => pair.upload_dir(&self.path, mode, &options),
        }
        .with_context(|| format!("failed to sync {}", self.path.display()))?;

        print_outcome(&self.path.display().to_string(), &outcome);
        Ok(())
    }
}

pub fn print_outcome(label: &str, outcome: &DirTransfer) {
    match outcome {
        DirTransfer::Incremental(report) => print_report(label, report),
        DirTransfer::Archive { source, target } => println!(
            "{} {label}: archived {} --> {}",
            "✓".green(),
            source.display(),
            target.display()
        ),
        DirTransfer::WouldArchive { source, target } => println!(
            "[dry-run] {label}: would archive {} --> {}",
            source.display(),
            target.display()
        ),
    }
}
