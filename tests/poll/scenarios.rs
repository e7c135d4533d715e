//! BDD scenarios for backup polling.

use rstest_bdd_macros::scenario;

use super::test_helpers::{PollContext, poll_context};

#[scenario(
    path = "tests/features/poll.feature",
    name = "A backup that reports progress and then completes succeeds"
)]
fn scenario_progress_then_done(poll_context: PollContext) {
    drop(poll_context);
}

#[scenario(path = "tests/features/poll.feature", name = "A failed backup ends the wait")]
fn scenario_failed_backup(poll_context: PollContext) {
    drop(poll_context);
}

#[scenario(
    path = "tests/features/poll.feature",
    name = "A backup that never finishes times out at the ceiling"
)]
fn scenario_times_out(poll_context: PollContext) {
    drop(poll_context);
}

#[scenario(
    path = "tests/features/poll.feature",
    name = "A missing status counts as pending"
)]
fn scenario_missing_status(poll_context: PollContext) {
    drop(poll_context);
}
