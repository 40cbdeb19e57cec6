//! SLURM command surface: history query, submission and cancellation.

use std::path::Path;

use pathsync_core::JobId;
use pathsync_sync::PathRoot;

use crate::cache::HistorySource;
use crate::report::{group_by_workdir, parse_report, JobHistory};
use crate::JobError;

const HISTORY_FORMAT: &str = "jobname%-100,workdir%-200,jobid,state,elapsed";

/// Builds scheduler commands from the configured template and script name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduler {
    /// Shell template with `{path}` and `{script_name}` placeholders.
    pub template: String,
    pub script_name: String,
}

impl Scheduler {
    pub fn new(template: impl Into<String>, script_name: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            script_name: script_name.into(),
        }
    }

    /// Allocations (`-X`) of `user` that started in the last `days` days.
    pub fn history_command(user: &str, days: u32) -> String {
        format!(
            "sacct -X -u {} -S $(date -d \"{days} days ago\" +%D-%R) --format={HISTORY_FORMAT}",
            shell_words::quote(user)
        )
    }

    pub fn cancel_command(job_id: &JobId) -> String {
        format!("scancel {}", shell_words::quote(&job_id.0))
    }

    /// Fill the template for a job in `workdir`. Both values are shell-quoted.
    pub fn render_submit(&self, workdir: &Path) -> Result<String, JobError> {
        if !self.template.contains("{path}") {
            return Err(JobError::Template {
                template: self.template.clone(),
                reason: "missing {path} placeholder".to_string(),
            });
        }
        let path = workdir.to_string_lossy();
        Ok(self
            .template
            .replace("{path}", &shell_words::quote(&path))
            .replace("{script_name}", &shell_words::quote(&self.script_name)))
    }

    /// Run the submission in `workdir` and return whatever it printed.
    pub fn submit(&self, remote: &PathRoot, workdir: &Path) -> Result<String, JobError> {
        let command = self.render_submit(workdir)?;
        let output = remote.run_raw(&command)?;
        tracing::info!(workdir = %workdir.display(), "submitted: {}", output.trim());
        Ok(output)
    }

    pub fn cancel(remote: &PathRoot, job_id: &JobId) -> Result<String, JobError> {
        let output = remote.run_raw(&Self::cancel_command(job_id))?;
        tracing::info!(job_id = %job_id, "cancelled job");
        Ok(output)
    }
}

/// History pulled with `sacct` through a remote root's channel.
#[derive(Debug, Clone, Copy)]
pub struct SacctSource<'a> {
    pub remote: &'a PathRoot,
    pub user: &'a str,
}

impl HistorySource for SacctSource<'_> {
    fn fetch_history(&self, days: u32) -> Result<JobHistory, JobError> {
        let output = self
            .remote
            .run_checked(&Scheduler::history_command(self.user, days))?;
        Ok(group_by_workdir(parse_report(&output)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathsync_core::config::{DEFAULT_SCRIPT_NAME, DEFAULT_SUBMIT_TEMPLATE};

    #[test]
    fn history_command_matches_sacct_contract() {
        assert_eq!(
            Scheduler::history_command("me", 3),
            "sacct -X -u me -S $(date -d \"3 days ago\" +%D-%R) \
             --format=jobname%-100,workdir%-200,jobid,state,elapsed"
        );
    }

    #[test]
    fn default_template_quotes_path() {
        let scheduler = Scheduler::new(DEFAULT_SUBMIT_TEMPLATE, DEFAULT_SCRIPT_NAME);
        assert_eq!(
            scheduler
                .render_submit(Path::new("/scratch/me/case 1"))
                .unwrap(),
            "cd '/scratch/me/case 1'; sbatch psubmit.sh"
        );
    }

    #[test]
    fn template_without_path_is_rejected() {
        let scheduler = Scheduler::new("sbatch {script_name}", "run.sh");
        assert!(matches!(
            scheduler.render_submit(Path::new("/x")),
            Err(JobError::Template { .. })
        ));
    }

    #[test]
    fn cancel_command_uses_job_id() {
        assert_eq!(
            Scheduler::cancel_command(&JobId::from("4242_7")),
            "scancel 4242_7"
        );
    }
}
