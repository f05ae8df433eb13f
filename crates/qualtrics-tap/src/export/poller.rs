//! Export status polling
//!
//! One status request per tick, a fixed wait between ticks, and a hard
//! ceiling on the number of ticks. The wait is raced against a
//! [`CancellationToken`] so a shutdown does not sit out a full interval.

use crate::api::ExportClient;
use crate::config::TapConfig;
use crate::error::{Result, TapError};
use crate::export::{ExportJob, ExportStatus};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait between consecutive status checks
    pub interval: Duration,
    /// Status checks before giving up
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn from_config(config: &TapConfig) -> Self {
        Self::new(config.poll_interval(), config.max_poll_attempts)
    }
}

/// Waits for a submitted export to reach a terminal state
pub struct ExportPoller<'a> {
    client: &'a ExportClient,
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl<'a> ExportPoller<'a> {
    pub fn new(client: &'a ExportClient, policy: PollPolicy, cancel: CancellationToken) -> Self {
        Self {
            client,
            policy,
            cancel,
        }
    }

    /// Poll until the export completes.
    ///
    /// Returns the job with `status == Complete` and a file identifier.
    /// `failed` ends polling with [`TapError::ExportFailed`]; a failed export
    /// cannot be resumed, only resubmitted.
    #[instrument(skip(self, job), fields(progress_id = %job.progress_id))]
    pub async fn wait(&self, mut job: ExportJob) -> Result<ExportJob> {
        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                self.pause(&job).await?;
            }

            let checked = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(cancelled(&job)),
                checked = self.client.export_progress(&job.progress_id) => checked,
            };
            let progress = checked.map_err(|source| TapError::PollTransport {
                progress_id: job.progress_id.clone(),
                source,
            })?;

            job.apply(progress);
            info!(
                attempt,
                status = job.status.as_str(),
                percent_complete = job.percent_complete,
                "Export status"
            );

            match job.status {
                ExportStatus::Complete => {
                    info!(file_id = ?job.file_id, "Export ready");
                    return Ok(job);
                },
                ExportStatus::Failed => {
                    return Err(TapError::ExportFailed {
                        progress_id: job.progress_id,
                    })
                },
                ExportStatus::InProgress => {},
            }
        }

        Err(TapError::PollTimeout {
            progress_id: job.progress_id,
            attempts: self.policy.max_attempts,
        })
    }

    async fn pause(&self, job: &ExportJob) -> Result<()> {
        debug!("Export not ready, checking again in {:?}", self.policy.interval);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled(job)),
            _ = tokio::time::sleep(self.policy.interval) => Ok(()),
        }
    }
}

fn cancelled(job: &ExportJob) -> TapError {
    TapError::Cancelled {
        progress_id: job.progress_id.clone(),
    }
}
