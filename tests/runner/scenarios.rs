//! BDD scenarios for runner outcomes and teardown.

use rstest_bdd_macros::scenario;

use super::test_helpers::{RunnerContext, runner_context};

#[scenario(
    path = "tests/features/runner.feature",
    name = "Teardown runs in reverse order after a passing body"
)]
fn scenario_reverse_teardown(runner_context: RunnerContext) {
    drop(runner_context);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "Teardown still runs after a failing body"
)]
fn scenario_teardown_after_failure(runner_context: RunnerContext) {
    drop(runner_context);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "A cleanup failure fails an otherwise passing scenario"
)]
fn scenario_cleanup_failure(runner_context: RunnerContext) {
    drop(runner_context);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "Known issues are skipped by default"
)]
fn scenario_known_issue_skipped(runner_context: RunnerContext) {
    drop(runner_context);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "Known issues run when requested"
)]
fn scenario_known_issue_run(runner_context: RunnerContext) {
    drop(runner_context);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "A missing mount path skips the scenario"
)]
fn scenario_missing_mount_path(runner_context: RunnerContext) {
    drop(runner_context);
}

#[scenario(
    path = "tests/features/runner.feature",
    name = "A configured mount path lets the scenario run"
)]
fn scenario_configured_mount_path(runner_context: RunnerContext) {
    drop(runner_context);
}
