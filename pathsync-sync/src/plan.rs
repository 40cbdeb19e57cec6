//! Pure diff step of a directory sync.
//!
//! Decision order for each source file:
//! 1. Filtered out (marker file, exclude list, include list) → ignored
//! 2. Absent from the destination listing → `need`
//! 3. Present, `force_full` → `update`
//! 4. Present, destination stat missing, older or a different size → `update`
//! 5. Otherwise → unchanged
//!
//! Subdirectories not listed in `exclude_dirs` go to `recurse`.

use std::collections::BTreeSet;

use serde::Serialize;

use pathsync_core::{DirectorySnapshot, FileEntry};

use crate::filter::NameFilter;
use crate::marker::MARKER_FILE_NAME;
use crate::SyncError;

/// What one directory pass will do. All lists are in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    /// Files missing from the destination.
    pub need: Vec<String>,
    /// Files present on both sides whose destination copy is stale.
    pub update: Vec<String>,
    /// Source subdirectories to descend into.
    pub recurse: Vec<String>,
}

impl SyncPlan {
    /// Transfer order: updates first, then missing files.
    pub fn transfers(&self) -> impl Iterator<Item = &str> {
        self.update.iter().chain(self.need.iter()).map(String::as_str)
    }

    pub fn transfer_count(&self) -> usize {
        self.update.len() + self.need.len()
    }

    /// `true` when no file would move.
    pub fn is_noop(&self) -> bool {
        self.need.is_empty() && self.update.is_empty()
    }
}

/// `true` if `dest` must be replaced by `source`.
///
/// Times are compared in whole seconds because remote listings and copies do
/// not carry sub-second precision reliably.
pub fn is_stale(source: &FileEntry, dest: &FileEntry) -> bool {
    dest.size != source.size || dest.modified.timestamp() < source.modified.timestamp()
}

/// Compute the plan for one directory.
///
/// `dest_stat` is asked only about names that exist in `dest_names` and pass
/// the filter; it is never called when `force_full` is set.
pub fn build_plan<F>(
    source: &DirectorySnapshot,
    dest_names: &BTreeSet<String>,
    filter: &NameFilter,
    exclude_dirs: &[String],
    force_full: bool,
    mut dest_stat: F,
) -> Result<SyncPlan, SyncError>
where
    F: FnMut(&str) -> Result<Option<FileEntry>, SyncError>,
{
    let mut plan = SyncPlan::default();

    for file in source.files() {
        if file.name == MARKER_FILE_NAME || !filter.allows(&file.name) {
            continue;
        }
        if !dest_names.contains(&file.name) {
            plan.need.push(file.name.clone());
            continue;
        }
        if force_full {
            plan.update.push(file.name.clone());
            continue;
        }
        match dest_stat(&file.name)? {
            Some(dest) if !is_stale(file, &dest) => {}
            _ => plan.update.push(file.name.clone()),
        }
    }

    plan.recurse = source
        .dirs()
        .filter(|d| !exclude_dirs.contains(&d.name))
        .map(|d| d.name.clone())
        .collect();

    Ok(plan)
}
