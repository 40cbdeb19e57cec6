//! Parsing of the scheduler history report.
//!
//! The report has two header lines (column titles, then dashes) followed by
//! one whitespace-separated row per job:
//!
//! ```text
//! JobName   WorkDir          JobID  State      Elapsed
//! -------   -------          -----  -----      -------
//! relax     /scratch/me/x    4242   COMPLETED  00:10:02
//! ```
//!
//! The state column may span several words (`CANCELLED by 1234`), so it is
//! everything between the job id and the last column.

use std::collections::BTreeMap;

use pathsync_core::{JobId, JobRecord, JobState};

use crate::JobError;

const HEADER_LINES: usize = 2;

/// Records per remote working directory, in report order (oldest first).
pub type JobHistory = BTreeMap<String, Vec<JobRecord>>;

pub fn parse_report(output: &str) -> Result<Vec<JobRecord>, JobError> {
    output
        .trim_start()
        .lines()
        .skip(HEADER_LINES)
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Result<JobRecord, JobError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return Err(JobError::Report {
            line: line.to_string(),
            reason: format!("expected at least 5 columns, found {}", fields.len()),
        });
    }
    let last = fields.len() - 1;
    let state = fields[3..last].join(" ");
    Ok(JobRecord {
        job_name: fields[0].to_string(),
        workdir: fields[1].to_string(),
        job_id: JobId::from(fields[2]),
        state: state.parse::<JobState>().unwrap_or_else(|never| match never {}),
        elapsed: fields[last].to_string(),
    })
}

pub fn group_by_workdir(records: Vec<JobRecord>) -> JobHistory {
    let mut history = JobHistory::new();
    for record in records {
        history
            .entry(record.workdir.clone())
            .or_default()
            .push(record);
    }
    history
}
