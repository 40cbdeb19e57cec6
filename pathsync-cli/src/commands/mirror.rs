//! `pathsync mirror`: two-way sync between two local directories.
//!
//! Runs dir1 → dir2, then dir2 → dir1. The passes are independent, so a file
//! edited on both sides is not merged.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use pathsync_sync::LocalPathRootPair;

use super::{print_report, FilterArgs};

#[derive(Args, Debug)]
pub struct MirrorArgs {
    pub dir1: PathBuf,
    pub dir2: PathBuf,

    #[command(flatten)]
    pub filter: FilterArgs,
}

impl MirrorArgs {
    pub fn run(self) -> Result<()> {
        let dir1 = std::path::absolute(&self.dir1)
            .with_context(|| format!("cannot resolve {}", self.dir1.display()))?;
        let dir2 = std::path::absolute(&self.dir2)
            .with_context(|| format!("cannot resolve {}", self.dir2.display()))?;
        let pair = LocalPathRootPair::from_paths(&dir1, &dir2);
        let options = self.filter.sync_options(&[]);
        let report = pair
            .sync_dir_contents(&dir1, Some(&dir2), &options)
            .with_context(|| {
                format!(
                    "mirror failed between {} and {}",
                    self.dir1.display(),
                    self.dir2.display()
                )
            })?;

        print_report(
            &format!("{} --> {}", self.dir1.display(), self.dir2.display()),
            &report.forward,
        );
        print_report(
            &format!("{} --> {}", self.dir2.display(), self.dir1.display()),
            &report.backward,
        );
        Ok(())
    }
}
