//! One connected cluster: root pair, job cache and scheduler in one place.

use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use pathsync_core::{JobId, JobRecord, JobState, SessionConfig};
use pathsync_sync::{
    connect, NameFilter, PathRoot, PathRootPair, RemoteHandle, SshOptions, SyncOptions,
};

use crate::cache::JobCache;
use crate::scheduler::{SacctSource, Scheduler};
use crate::submit::{decide, Decision, SubmitOptions, SubmitOutcome};
use crate::JobError;

#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    pair: PathRootPair,
    cache: JobCache,
    scheduler: Scheduler,
}

/// Open an OpenSSH control master for `config` and wrap it in a handle.
fn open_handle(config: &SessionConfig) -> Result<RemoteHandle, JobError> {
    let options =
        SshOptions::new(&config.hostname, &config.username).with_keepalive(config.keepalive);
    let interactive = std::io::stdin().is_terminal();
    let (exec, transfer) = connect(options, config.try_agent, interactive)?;
    tracing::info!(host = %config.hostname, user = %config.username, "connected");
    Ok(RemoteHandle::new(
        config.hostname.clone(),
        Arc::new(exec),
        Arc::new(transfer),
    ))
}

impl Session {
    /// Connect over SSH using the resolved configuration.
    pub fn connect(config: SessionConfig) -> Result<Self, JobError> {
        let handle = open_handle(&config)?;
        let pair = PathRootPair::new(
            PathRoot::local(&config.local_root),
            PathRoot::remote(&config.remote_root, handle),
        );
        Ok(Self::new(config, pair))
    }

    /// Build a session around an existing pair (tests, custom channels).
    pub fn new(config: SessionConfig, pair: PathRootPair) -> Self {
        let cache = JobCache::new(config.job_cache_refresh);
        let scheduler = Scheduler::new(&config.submit_template, &config.script_name);
        Self {
            config,
            pair,
            cache,
            scheduler,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn pair(&self) -> &PathRootPair {
        &self.pair
    }

    /// Open a fresh connection and point the remote root at it.
    pub fn reconnect(&mut self) -> Result<(), JobError> {
        let handle = open_handle(&self.config)?;
        self.pair.reconnect(handle);
        Ok(())
    }

    /// Default sync options: the configured exclude list, everything else
    /// at its default.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            filter: NameFilter::excluding(self.config.exclude_names.iter().cloned()),
            ..SyncOptions::default()
        }
    }

    fn remote_workdir(&self, arb: &Path) -> Result<String, JobError> {
        let (_, remote) = self.pair.resolve(arb)?;
        Ok(remote.to_string_lossy().into_owned())
    }

    pub fn latest_job(&mut self, arb: &Path, window: u32) -> Result<Option<JobRecord>, JobError> {
        let workdir = self.remote_workdir(arb)?;
        let source = SacctSource {
            remote: self.pair.remote(),
            user: &self.config.username,
        };
        self.cache.latest(&source, &workdir, window)
    }

    pub fn job_state(&mut self, arb: &Path, window: u32) -> Result<Option<JobState>, JobError> {
        Ok(self.latest_job(arb, window)?.map(|r| r.state))
    }

    pub fn job_history(&mut self, arb: &Path, window: u32) -> Result<Vec<JobRecord>, JobError> {
        let workdir = self.remote_workdir(arb)?;
        let source = SacctSource {
            remote: self.pair.remote(),
            user: &self.config.username,
        };
        self.cache.history(&source, &workdir, window)
    }

    pub fn latest_jobs(
        &mut self,
        window: u32,
        exclude_cancelled: bool,
    ) -> Result<BTreeMap<String, JobRecord>, JobError> {
        let source = SacctSource {
            remote: self.pair.remote(),
            user: &self.config.username,
        };
        self.cache.latest_jobs(&source, window, exclude_cancelled)
    }

    pub fn is_queued(&mut self, arb: &Path, window: u32) -> Result<bool, JobError> {
        Ok(self
            .job_state(arb, window)?
            .is_some_and(|state| state.is_queued()))
    }

    /// Upload `arb` and submit it, unless its latest job says otherwise.
    pub fn submit_if_needed(
        &mut self,
        arb: &Path,
        options: &SubmitOptions,
    ) -> Result<SubmitOutcome, JobError> {
        let latest = self.latest_job(arb, options.window_days)?;
        let previous = latest.as_ref().map(|r| r.state.clone());

        let (cancel, refresh_first) =
            match decide(latest.as_ref(), options.force, options.refresh_on_timeout) {
                Decision::Abort(reason) => {
                    tracing::info!(path = %arb.display(), "not submitting: {reason}");
                    return Ok(SubmitOutcome::Skipped { reason });
                }
                Decision::Proceed {
                    cancel,
                    refresh_first,
                } => (cancel, refresh_first),
            };

        if let Some(job_id) = &cancel {
            self.cancel(job_id)?;
        }

        let refreshed = if refresh_first {
            tracing::info!(path = %arb.display(), "job timed out; pulling results first");
            Some(
                self.pair
                    .download_dir(arb, options.mode, &self.sync_options())?,
            )
        } else {
            None
        };

        let upload_options = SyncOptions {
            force_full: true,
            ..self.sync_options()
        };
        let upload = self.pair.upload_dir(arb, options.mode, &upload_options)?;
        let output = self.submit_path(arb)?;

        Ok(SubmitOutcome::Submitted {
            previous,
            cancelled: cancel,
            refreshed,
            upload,
            output,
        })
    }

    /// Submit the remote counterpart of `arb` without any checks.
    pub fn submit_path(&mut self, arb: &Path) -> Result<String, JobError> {
        let (_, remote_dir) = self.pair.resolve(arb)?;
        let output = self.scheduler.submit(self.pair.remote(), &remote_dir)?;
        self.cache.invalidate();
        Ok(output)
    }

    pub fn cancel(&mut self, job_id: &JobId) -> Result<String, JobError> {
        let output = Scheduler::cancel(self.pair.remote(), job_id)?;
        self.cache.invalidate();
        Ok(output)
    }
}
