//! Shared fixtures for backup polling scenarios.

use std::iter;

use rstest::fixture;
use sdk_test::api::SdkCloudBackupStatusType;
use sdk_test::test_support::ScriptedStatusSource;
use sdk_test::{BackupPoller, PollError, PollPolicy, PollReport};
use tokio::runtime::Builder;

pub const VOLUME_ID: &str = "vol-backup";

#[derive(Clone, Debug, Default)]
pub struct PollContext {
    pub statuses: Vec<Option<SdkCloudBackupStatusType>>,
    pub policy: PollPolicy,
    pub result: Option<Result<PollReport, PollError>>,
}

#[fixture]
pub fn poll_context() -> PollContext {
    PollContext::default()
}

/// `count` copies of `status` followed by `last`.
pub fn script(
    status: Option<SdkCloudBackupStatusType>,
    count: usize,
    last: SdkCloudBackupStatusType,
) -> Vec<Option<SdkCloudBackupStatusType>> {
    iter::repeat_n(status, count)
        .chain(iter::once(Some(last)))
        .collect()
}

/// Runs the poller on a current-thread runtime with a paused clock so the
/// intervals elapse instantly.
pub fn wait(context: &PollContext) -> Result<PollReport, PollError> {
    let runtime = Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap_or_else(|err| panic!("paused runtime should build: {err}"));
    let source = ScriptedStatusSource::new(context.statuses.iter().copied());
    runtime.block_on(async { BackupPoller::new(&source, context.policy).wait(VOLUME_ID).await })
}
