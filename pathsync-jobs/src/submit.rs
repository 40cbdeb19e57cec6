//! Submission guard.
//!
//! | latest state | without force | with force                    |
//! |--------------|---------------|-------------------------------|
//! | RUNNING      | skip          | skip                          |
//! | PENDING      | skip          | cancel the pending job, go    |
//! | COMPLETED    | skip          | go                            |
//! | TIMEOUT      | go            | go                            |
//! | none / other | go            | go                            |
//!
//! A TIMEOUT job can first have its partial results pulled down so the
//! upload does not clobber them.

use std::fmt;

use serde::Serialize;

use pathsync_core::{JobId, JobRecord, JobState};
use pathsync_sync::{DirTransfer, TransferMode};

/// Why a submission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    Running,
    Pending,
    Completed,
}

impl SkipReason {
    /// The job state that caused the refusal.
    pub fn state(&self) -> JobState {
        match self {
            SkipReason::Running => JobState::Running,
            SkipReason::Pending => JobState::Pending,
            SkipReason::Completed => JobState::Completed,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Running => write!(f, "job is currently running"),
            SkipReason::Pending => {
                write!(f, "job is pending; force to cancel it and resubmit")
            }
            SkipReason::Completed => write!(f, "job already completed; force to resubmit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Abort(SkipReason),
    Proceed {
        /// Pending job to cancel before uploading.
        cancel: Option<JobId>,
        /// Pull remote results down before uploading.
        refresh_first: bool,
    },
}

/// Decide what to do given the most recent job for a directory.
pub fn decide(latest: Option<&JobRecord>, force: bool, refresh_on_timeout: bool) -> Decision {
    let Some(job) = latest else {
        return Decision::Proceed {
            cancel: None,
            refresh_first: false,
        };
    };
    match (&job.state, force) {
        (JobState::Running, _) => Decision::Abort(SkipReason::Running),
        (JobState::Pending, false) => Decision::Abort(SkipReason::Pending),
        (JobState::Pending, true) => Decision::Proceed {
            cancel: Some(job.job_id.clone()),
            refresh_first: false,
        },
        (JobState::Completed, false) => Decision::Abort(SkipReason::Completed),
        (JobState::Timeout, _) => Decision::Proceed {
            cancel: None,
            refresh_first: refresh_on_timeout,
        },
        _ => Decision::Proceed {
            cancel: None,
            refresh_first: false,
        },
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOptions {
    pub force: bool,
    /// Download the directory first when the last job timed out.
    pub refresh_on_timeout: bool,
    pub mode: TransferMode,
    /// Lookback window for the job state check, in days.
    pub window_days: u32,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            force: false,
            refresh_on_timeout: true,
            mode: TransferMode::Archive,
            window_days: pathsync_core::config::DEFAULT_LOOKBACK_DAYS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum SubmitOutcome {
    Skipped {
        reason: SkipReason,
    },
    Submitted {
        previous: Option<JobState>,
        cancelled: Option<JobId>,
        refreshed: Option<DirTransfer>,
        upload: DirTransfer,
        /// Scheduler output, unverified.
        output: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state: JobState) -> JobRecord {
        JobRecord {
            workdir: "/jobs/x".into(),
            job_name: "relax".into(),
            job_id: JobId::from("77"),
            state,
            elapsed: "00:00:01".into(),
        }
    }

    fn go(cancel: Option<&str>, refresh_first: bool) -> Decision {
        Decision::Proceed {
            cancel: cancel.map(JobId::from),
            refresh_first,
        }
    }

    #[test]
    fn running_always_aborts() {
        for force in [false, true] {
            assert_eq!(
                decide(Some(&record(JobState::Running)), force, true),
                Decision::Abort(SkipReason::Running)
            );
        }
    }

    #[test]
    fn pending_needs_force_and_cancels() {
        let pending = record(JobState::Pending);
        assert_eq!(
            decide(Some(&pending), false, true),
            Decision::Abort(SkipReason::Pending)
        );
        assert_eq!(decide(Some(&pending), true, true), go(Some("77"), false));
    }

    #[test]
    fn completed_needs_force() {
        let done = record(JobState::Completed);
        assert_eq!(
            decide(Some(&done), false, true),
            Decision::Abort(SkipReason::Completed)
        );
        assert_eq!(decide(Some(&done), true, true), go(None, false));
    }

    #[test]
    fn timeout_proceeds_with_optional_refresh() {
        let timeout = record(JobState::Timeout);
        assert_eq!(decide(Some(&timeout), false, true), go(None, true));
        assert_eq!(decide(Some(&timeout), false, false), go(None, false));
        assert_eq!(decide(Some(&timeout), true, true), go(None, true));
    }

    #[test]
    fn unknown_or_missing_state_proceeds() {
        assert_eq!(decide(None, false, true), go(None, false));
        assert_eq!(
            decide(Some(&record(JobState::Cancelled)), false, true),
            go(None, false)
        );
        assert_eq!(
            decide(Some(&record(JobState::Other("FAILED".into()))), false, true),
            go(None, false)
        );
    }
}
