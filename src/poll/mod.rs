//! Wait loop for asynchronous cloud backup operations.
//!
//! A backup is started by one RPC and observed through repeated status
//! queries. [`BackupPoller`] drives those queries on a fixed interval until the
//! operation reaches a terminal state or the deadline passes. Each `Active`
//! report pushes the deadline out by [`PollPolicy::extension`], but never past
//! [`PollPolicy::ceiling`], so a backup that reports progress forever still
//! terminates.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::api::SdkCloudBackupStatusType;

/// Boxed future returned by [`BackupStatusSource::status`].
pub type StatusFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<SdkCloudBackupStatusType>, PollError>> + Send + 'a>>;

/// Reports the current backup status for a volume.
///
/// `Ok(None)` means the server has not reported a status for the volume yet.
pub trait BackupStatusSource {
    /// Queries the latest status for `volume_id`.
    fn status<'a>(&'a self, volume_id: &'a str) -> StatusFuture<'a>;
}

/// Timing parameters for [`BackupPoller`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between status queries.
    pub interval: Duration,
    /// Initial time allowed before the first extension.
    pub budget: Duration,
    /// Deadline extension granted for each `Active` report.
    pub extension: Duration,
    /// Absolute limit measured from the first poll.
    pub ceiling: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            budget: Duration::from_secs(300),
            extension: Duration::from_secs(10),
            ceiling: Duration::from_secs(900),
        }
    }
}

/// Result of a backup that reached `Done`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollReport {
    /// Number of status queries issued, including the final one.
    pub polls: u32,
    /// Time spent waiting.
    pub elapsed: Duration,
}

/// Errors raised by the wait loop.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PollError {
    /// The status query itself failed.
    #[error("backup status query for volume {volume_id} failed: {message}")]
    Rpc {
        /// Volume being backed up.
        volume_id: String,
        /// gRPC status rendered for display.
        message: String,
    },
    /// The server reported the backup as failed.
    #[error("cloud backup of volume {volume_id} failed after {polls} polls")]
    Failed {
        /// Volume being backed up.
        volume_id: String,
        /// Number of status queries issued.
        polls: u32,
    },
    /// No terminal state was reached before the deadline.
    #[error("cloud backup of volume {volume_id} timed out after {elapsed:?} ({polls} polls)")]
    Timeout {
        /// Volume being backed up.
        volume_id: String,
        /// Number of status queries issued.
        polls: u32,
        /// Time spent waiting.
        elapsed: Duration,
    },
}

/// Polls a [`BackupStatusSource`] according to a [`PollPolicy`].
#[derive(Clone, Copy, Debug)]
pub struct BackupPoller<'s, S> {
    source: &'s S,
    policy: PollPolicy,
}

impl<'s, S: BackupStatusSource> BackupPoller<'s, S> {
    /// Creates a poller over `source`.
    pub const fn new(source: &'s S, policy: PollPolicy) -> Self {
        Self { source, policy }
    }

    /// Waits for the backup of `volume_id` to finish.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::Failed`] when the backup fails,
    /// [`PollError::Timeout`] when the deadline passes first, and
    /// [`PollError::Rpc`] when a status query fails.
    pub async fn wait(&self, volume_id: &str) -> Result<PollReport, PollError> {
        let started = Instant::now();
        let ceiling = started + self.policy.ceiling;
        let mut deadline = (started + self.policy.budget).min(ceiling);
        let mut polls: u32 = 0;

        loop {
            polls = polls.saturating_add(1);
            let status = self.source.status(volume_id).await?;
            match status {
                Some(SdkCloudBackupStatusType::Done) => {
                    let report = PollReport {
                        polls,
                        elapsed: started.elapsed(),
                    };
                    debug!(volume_id, polls, elapsed = ?report.elapsed, "cloud backup done");
                    return Ok(report);
                }
                Some(SdkCloudBackupStatusType::Failed) => {
                    return Err(PollError::Failed {
                        volume_id: volume_id.to_owned(),
                        polls,
                    });
                }
                Some(SdkCloudBackupStatusType::Active) => {
                    deadline = (deadline + self.policy.extension).min(ceiling);
                    debug!(volume_id, polls, "cloud backup active; deadline extended");
                }
                other => {
                    debug!(volume_id, polls, status = ?other, "cloud backup pending");
                }
            }

            if Instant::now() + self.policy.interval > deadline {
                return Err(PollError::Timeout {
                    volume_id: volume_id.to_owned(),
                    polls,
                    elapsed: started.elapsed(),
                });
            }
            sleep(self.policy.interval).await;
        }
    }
}
