//! Time-windowed cache of scheduler history.
//!
//! One entry per lookback window (in days). An entry is fetched on first
//! access and replaced wholesale once it is older than the refresh interval;
//! it is never patched in place.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};

use pathsync_core::{JobRecord, JobState};

use crate::report::JobHistory;
use crate::JobError;

/// Anything that can produce the job history for a lookback window.
pub trait HistorySource {
    fn fetch_history(&self, days: u32) -> Result<JobHistory, JobError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    jobs: JobHistory,
    fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    fn expired(&self, now: DateTime<Utc>, refresh_interval: Duration) -> bool {
        now.signed_duration_since(self.fetched_at)
            .to_std()
            .map_or(false, |age| age > refresh_interval)
    }
}

#[derive(Debug, Clone)]
pub struct JobCache {
    refresh_interval: Duration,
    entries: HashMap<u32, CacheEntry>,
}

impl JobCache {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            refresh_interval,
            entries: HashMap::new(),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Drop every entry so the next access refetches.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    /// History for `window` days as of `now`, refetching if absent or expired.
    pub fn get_at(
        &mut self,
        source: &dyn HistorySource,
        window: u32,
        now: DateTime<Utc>,
    ) -> Result<&JobHistory, JobError> {
        let refresh_interval = self.refresh_interval;
        let entry = match self.entries.entry(window) {
            Entry::Occupied(slot) if !slot.get().expired(now, refresh_interval) => slot.into_mut(),
            slot => {
                tracing::debug!(window, "refreshing job history");
                let fresh = CacheEntry {
                    jobs: source.fetch_history(window)?,
                    fetched_at: now,
                };
                match slot {
                    Entry::Occupied(mut slot) => {
                        slot.insert(fresh);
                        slot.into_mut()
                    }
                    Entry::Vacant(slot) => slot.insert(fresh),
                }
            }
        };
        Ok(&entry.jobs)
    }

    pub fn get(
        &mut self,
        source: &dyn HistorySource,
        window: u32,
    ) -> Result<&JobHistory, JobError> {
        self.get_at(source, window, Utc::now())
    }

    /// Every record for `workdir`, oldest first. Empty if it has none.
    pub fn history(
        &mut self,
        source: &dyn HistorySource,
        workdir: &str,
        window: u32,
    ) -> Result<Vec<JobRecord>, JobError> {
        Ok(self
            .get(source, window)?
            .get(workdir)
            .cloned()
            .unwrap_or_default())
    }

    /// Most recent record for `workdir`.
    pub fn latest(
        &mut self,
        source: &dyn HistorySource,
        workdir: &str,
        window: u32,
    ) -> Result<Option<JobRecord>, JobError> {
        Ok(self
            .get(source, window)?
            .get(workdir)
            .and_then(|records| records.last())
            .cloned())
    }

    pub fn latest_state(
        &mut self,
        source: &dyn HistorySource,
        workdir: &str,
        window: u32,
    ) -> Result<Option<JobState>, JobError> {
        Ok(self.latest(source, workdir, window)?.map(|r| r.state))
    }

    /// Latest record per workdir, optionally hiding workdirs whose latest job
    /// was cancelled.
    pub fn latest_jobs(
        &mut self,
        source: &dyn HistorySource,
        window: u32,
        exclude_cancelled: bool,
    ) -> Result<BTreeMap<String, JobRecord>, JobError> {
        Ok(self
            .get(source, window)?
            .iter()
            .filter_map(|(workdir, records)| records.last().map(|r| (workdir, r)))
            .filter(|(_, r)| !(exclude_cancelled && r.state == JobState::Cancelled))
            .map(|(workdir, r)| (workdir.clone(), r.clone()))
            .collect())
    }

    pub fn is_running(
        &mut self,
        source: &dyn HistorySource,
        workdir: &str,
        window: u32,
    ) -> Result<bool, JobError> {
        Ok(self.latest_state(source, workdir, window)? == Some(JobState::Running))
    }

    pub fn is_pending(
        &mut self,
        source: &dyn HistorySource,
        workdir: &str,
        window: u32,
    ) -> Result<bool, JobError> {
        Ok(self.latest_state(source, workdir, window)? == Some(JobState::Pending))
    }

    pub fn is_queued(
        &mut self,
        source: &dyn HistorySource,
        workdir: &str,
        window: u32,
    ) -> Result<bool, JobError> {
        Ok(self
            .latest_state(source, workdir, window)?
            .is_some_and(|state| state.is_queued()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::report::{group_by_workdir, parse_report};

    struct Scripted {
        report: &'static str,
        calls: Cell<u32>,
    }

    impl Scripted {
        fn new(report: &'static str) -> Self {
            Self {
                report,
                calls: Cell::new(0),
            }
        }
    }

    impl HistorySource for Scripted {
        fn fetch_history(&self, _days: u32) -> Result<JobHistory, JobError> {
            self.calls.set(self.calls.get() + 1);
            Ok(group_by_workdir(parse_report(self.report)?))
        }
    }

    const REPORT: &str = "\
h
-
relax /jobs/x 100 PENDING   00:00:00
relax /jobs/y 101 CANCELLED 00:00:01
scf   /jobs/x 102 COMPLETED 00:10:00
scf   /jobs/r 103 RUNNING   00:10:00
";

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn latest_state_is_last_record() {
        let source = Scripted::new(REPORT);
        let mut cache = JobCache::new(Duration::from_secs(60));
        assert_eq!(
            cache.latest_state(&source, "/jobs/x", 1).unwrap(),
            Some(JobState::Completed)
        );
        assert_eq!(cache.history(&source, "/jobs/x", 1).unwrap().len(), 2);
        assert_eq!(cache.latest_state(&source, "/jobs/none", 1).unwrap(), None);
    }

    #[test]
    fn refetches_only_after_interval() {
        let source = Scripted::new(REPORT);
        let mut cache = JobCache::new(Duration::from_secs(60));

        cache.get_at(&source, 3, at(1_000)).unwrap();
        cache.get_at(&source, 3, at(1_030)).unwrap();
        cache.get_at(&source, 3, at(1_060)).unwrap();
        assert_eq!(source.calls.get(), 1);

        cache.get_at(&source, 3, at(1_061)).unwrap();
        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn windows_are_cached_independently() {
        let source = Scripted::new(REPORT);
        let mut cache = JobCache::new(Duration::from_secs(60));
        cache.get_at(&source, 1, at(0)).unwrap();
        cache.get_at(&source, 3, at(0)).unwrap();
        cache.get_at(&source, 1, at(10)).unwrap();
        assert_eq!(source.calls.get(), 2);

        cache.invalidate();
        cache.get_at(&source, 1, at(10)).unwrap();
        assert_eq!(source.calls.get(), 3);
    }

    #[test]
    fn latest_jobs_can_hide_cancelled() {
        let source = Scripted::new(REPORT);
        let mut cache = JobCache::new(Duration::from_secs(60));
        let all = cache.latest_jobs(&source, 1, false).unwrap();
        let live = cache.latest_jobs(&source, 1, true).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(live.len(), 2);
        assert!(!live.contains_key("/jobs/y"));
    }

    #[test]
    fn queue_predicates() {
        let source = Scripted::new(REPORT);
        let mut cache = JobCache::new(Duration::from_secs(60));
        assert!(cache.is_running(&source, "/jobs/r", 1).unwrap());
        assert!(cache.is_queued(&source, "/jobs/r", 1).unwrap());
        assert!(!cache.is_pending(&source, "/jobs/x", 1).unwrap());
        assert!(!cache.is_queued(&source, "/jobs/x", 1).unwrap());
    }
}
