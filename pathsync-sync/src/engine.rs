//! Recursive one-directional directory sync.
//!
//! Per directory: make sure the destination exists, diff a detailed source
//! snapshot against a cheap destination name listing, transfer stale and
//! missing files, stamp the destination marker, then descend. The walk is
//! depth-first and sequential. The first error aborts it; directories already
//! processed keep their markers.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::filter::NameFilter;
use crate::marker::{marker_path, write_marker};
use crate::plan::{build_plan, SyncPlan};
use crate::root::PathRoot;
use crate::transfer::copy_file;
use crate::SyncError;

/// Knobs for [`sync_directory`].
#[derive(Debug, Clone, Serialize)]
pub struct SyncOptions {
    pub filter: NameFilter,
    /// Subdirectory names never descended into, at any depth.
    pub exclude_dirs: Vec<String>,
    pub recursive: bool,
    /// Transfer every present file regardless of staleness.
    pub force_full: bool,
    /// Plan only: no directories created, no transfers, no markers.
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            filter: NameFilter::default(),
            exclude_dirs: Vec::new(),
            recursive: true,
            force_full: false,
            dry_run: false,
        }
    }
}

/// Plan executed (or, in a dry run, computed) for one directory.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryOutcome {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub plan: SyncPlan,
}

/// Result of one [`sync_directory`] call, in visit order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub directories: Vec<DirectoryOutcome>,
    pub dry_run: bool,
}

impl SyncReport {
    /// Number of files transferred (or that would be, in a dry run).
    pub fn transferred(&self) -> usize {
        self.directories.iter().map(|d| d.plan.transfer_count()).sum()
    }

    /// `(source, destination)` of every planned transfer.
    pub fn transfers(&self) -> impl Iterator<Item = (PathBuf, PathBuf)> + '_ {
        self.directories.iter().flat_map(|d| {
            d.plan
                .transfers()
                .map(move |name| (d.source_dir.join(name), d.dest_dir.join(name)))
        })
    }

    fn absorb(&mut self, other: SyncReport) {
        self.directories.extend(other.directories);
    }
}

/// Bring `dest_dir` on `dest` up to date with `source_dir` on `source`.
pub fn sync_directory(
    source: &PathRoot,
    source_dir: &Path,
    dest: &PathRoot,
    dest_dir: &Path,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport {
        directories: Vec::new(),
        dry_run: options.dry_run,
    };

    let dest_exists = if options.dry_run {
        dest.is_dir(dest_dir)?
    } else {
        dest.make_dir(dest_dir)?;
        true
    };

    let snapshot = source.detailed_snapshot(source_dir)?;
    let dest_names = if dest_exists {
        dest.list_names(dest_dir)?
    } else {
        Default::default()
    };

    let plan = build_plan(
        &snapshot,
        &dest_names,
        &options.filter,
        &options.exclude_dirs,
        options.force_full,
        |name| dest.stat(&dest_dir.join(name)),
    )?;

    if plan.is_noop() {
        tracing::debug!("{} is up to date", dest_dir.display());
    } else if options.dry_run {
        for name in plan.transfers() {
            tracing::info!(
                "would copy {} --> {}",
                source_dir.join(name).display(),
                dest_dir.join(name).display()
            );
        }
    } else {
        for name in plan.transfers() {
            copy_file(source, &source_dir.join(name), dest, &dest_dir.join(name))?;
        }
        tracing::info!(
            "{}: {} updated, {} new",
            dest_dir.display(),
            plan.update.len(),
            plan.need.len()
        );
    }

    if !options.dry_run {
        write_marker(dest, dest_dir, Utc::now())?;
        tracing::debug!("stamped {}", marker_path(dest_dir).display());
    }

    let recurse = if options.recursive {
        plan.recurse.clone()
    } else {
        Vec::new()
    };
    report.directories.push(DirectoryOutcome {
        source_dir: source_dir.to_path_buf(),
        dest_dir: dest_dir.to_path_buf(),
        plan,
    });

    for name in recurse {
        let child = sync_directory(
            source,
            &source_dir.join(&name),
            dest,
            &dest_dir.join(&name),
            options,
        )?;
        report.absorb(child);
    }

    Ok(report)
}
