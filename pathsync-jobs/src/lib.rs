//! # pathsync-jobs
//!
//! Scheduler job tracking and guarded submission on top of a
//! [`pathsync_sync::PathRootPair`].
//!
//! [`Session`] owns the pair, a [`JobCache`] and the [`Scheduler`] commands;
//! [`Session::submit_if_needed`] is the guarded entry point.

pub mod cache;
mod error;
pub mod report;
pub mod scheduler;
pub mod session;
pub mod submit;

pub use cache::{HistorySource, JobCache};
pub use error::JobError;
pub use report::{group_by_workdir, parse_report, JobHistory};
pub use scheduler::{SacctSource, Scheduler};
pub use session::Session;
pub use submit::{decide, Decision, SkipReason, SubmitOptions, SubmitOutcome};
