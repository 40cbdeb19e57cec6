//! Name-based include/exclude filtering.

use serde::Serialize;

/// File-name filter applied by the diff engine.
///
/// Exclusion is applied first; when `include` is set only listed names
/// survive. Directory names are never filtered here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NameFilter {
    pub exclude: Vec<String>,
    pub include: Option<Vec<String>>,
}

impl NameFilter {
    pub fn excluding<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude: names.into_iter().map(Into::into).collect(),
            include: None,
        }
    }

    pub fn allows(&self, name: &str) -> bool {
        if self.exclude.iter().any(|n| n == name) {
            return false;
        }
        match &self.include {
            Some(include) => include.iter().any(|n| n == name),
            None => true,
        }
    }
}

/// Filter for archive transfers, where include and exclude cannot be combined.
///
/// Names match any path segment inside the archived tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum ArchiveFilter {
    #[default]
    All,
    Exclude(Vec<String>),
    Include(Vec<String>),
}

impl From<&NameFilter> for ArchiveFilter {
    /// An include list wins over the exclude list.
    fn from(filter: &NameFilter) -> Self {
        match &filter.include {
            Some(include) => ArchiveFilter::Include(include.clone()),
            None if filter.exclude.is_empty() => ArchiveFilter::All,
            None => ArchiveFilter::Exclude(filter.exclude.clone()),
        }
    }
}
