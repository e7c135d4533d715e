//! BDD step definitions for backup polling.

use rstest_bdd_macros::{given, then, when};
use sdk_test::PollError;
use sdk_test::api::SdkCloudBackupStatusType::{Active, Done, Failed};

use super::test_helpers::{PollContext, script, wait};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a backup that reports \"{count}\" active statuses and then completes")]
fn active_then_done(mut poll_context: PollContext, count: usize) -> PollContext {
    poll_context.statuses = script(Some(Active), count, Done);
    poll_context
}

#[given("a backup that reports \"{count}\" active statuses and then fails")]
fn active_then_failed(mut poll_context: PollContext, count: usize) -> PollContext {
    poll_context.statuses = script(Some(Active), count, Failed);
    poll_context
}

#[given("a backup that stays active forever")]
fn always_active(mut poll_context: PollContext) -> PollContext {
    poll_context.statuses = vec![Some(Active)];
    poll_context
}

#[given("a backup whose status is missing \"{count}\" times and then completes")]
fn missing_then_done(mut poll_context: PollContext, count: usize) -> PollContext {
    poll_context.statuses = script(None, count, Done);
    poll_context
}

#[when("the suite waits for the backup")]
fn suite_waits(mut poll_context: PollContext) -> PollContext {
    poll_context.result = Some(wait(&poll_context));
    poll_context
}

#[then("the wait succeeds after \"{polls}\" polls")]
fn wait_succeeds(poll_context: &PollContext, polls: u32) -> Result<(), StepError> {
    match &poll_context.result {
        Some(Ok(report)) if report.polls == polls => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected success after {polls} polls, got {other:?}"
        ))),
    }
}

#[then("the wait took \"{intervals}\" poll intervals")]
fn wait_took_intervals(poll_context: &PollContext, intervals: u32) -> Result<(), StepError> {
    let expected = poll_context.policy.interval * intervals;
    match &poll_context.result {
        Some(Ok(report)) if report.elapsed == expected => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {expected:?} of waiting, got {other:?}"
        ))),
    }
}

#[then("the wait fails because the backup failed after \"{polls}\" polls")]
fn wait_fails(poll_context: &PollContext, polls: u32) -> Result<(), StepError> {
    match &poll_context.result {
        Some(Err(PollError::Failed { polls: actual, .. })) if *actual == polls => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a failed backup after {polls} polls, got {other:?}"
        ))),
    }
}

#[then("the wait times out without crossing the ceiling")]
fn wait_times_out(poll_context: &PollContext) -> Result<(), StepError> {
    let ceiling = poll_context.policy.ceiling;
    match &poll_context.result {
        Some(Err(PollError::Timeout { elapsed, .. })) if *elapsed <= ceiling => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a timeout within {ceiling:?}, got {other:?}"
        ))),
    }
}
