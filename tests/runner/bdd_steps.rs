//! BDD step definitions for runner outcomes and teardown.

use camino::Utf8PathBuf;
use rstest_bdd_macros::{given, then, when};
use sdk_test::{CleanupAction, Outcome};

use super::test_helpers::{Body, RunnerContext, RunnerTestError, detach_vol_1, execute};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Setup(#[from] RunnerTestError),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

const fn label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Passed => "passed",
        Outcome::Skipped { .. } => "skipped",
        Outcome::Failed { .. } => "failed",
    }
}

fn outcome(runner_context: &RunnerContext) -> Result<&Outcome, StepError> {
    runner_context
        .outcome
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("the runner has not executed")))
}

fn performed_labels(runner_context: &RunnerContext) -> Vec<String> {
    runner_context
        .performed
        .iter()
        .map(CleanupAction::to_string)
        .collect()
}

#[given("a scenario that attaches a volume and passes")]
fn attaching_scenario(mut runner_context: RunnerContext) -> RunnerContext {
    runner_context.body = Body::AttachesAndPasses;
    runner_context
}

#[given("a scenario that creates a volume and fails")]
fn failing_scenario(mut runner_context: RunnerContext) -> RunnerContext {
    runner_context.body = Body::CreatesAndFails;
    runner_context
}

#[given("a scenario registered as a known issue")]
fn known_issue_scenario(mut runner_context: RunnerContext) -> RunnerContext {
    runner_context.known_issue = true;
    runner_context
}

#[given("a scenario that needs a mount path")]
fn mount_scenario(mut runner_context: RunnerContext) -> RunnerContext {
    runner_context.needs_mount_path = true;
    runner_context
}

#[given("detaching the volume fails during cleanup")]
fn detach_fails(mut runner_context: RunnerContext) -> RunnerContext {
    runner_context.failing_cleanup.push(detach_vol_1());
    runner_context
}

#[given("known issues are enabled")]
fn known_issues_enabled(mut runner_context: RunnerContext) -> RunnerContext {
    runner_context.options.run_known_issues = true;
    runner_context
}

#[given("a mount path is configured")]
fn mount_path_configured(mut runner_context: RunnerContext) -> RunnerContext {
    runner_context.mount_path = Some(Utf8PathBuf::from("/mnt/sanity"));
    runner_context
}

#[when("the runner executes the scenario")]
fn runner_executes(runner_context: RunnerContext) -> Result<RunnerContext, StepError> {
    Ok(execute(runner_context)?)
}

#[then("the outcome is \"{expected}\"")]
fn outcome_is(runner_context: &RunnerContext, expected: String) -> Result<(), StepError> {
    let actual = outcome(runner_context)?;
    if label(actual) == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {expected}, got {actual:?}"
        )))
    }
}

#[then("the failure mentions \"{text}\"")]
fn failure_mentions(runner_context: &RunnerContext, text: String) -> Result<(), StepError> {
    match outcome(runner_context)? {
        Outcome::Failed { message } if message.contains(&text) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a failure mentioning {text:?}, got {other:?}"
        ))),
    }
}

#[then("the skip reason mentions \"{text}\"")]
fn skip_mentions(runner_context: &RunnerContext, text: String) -> Result<(), StepError> {
    match outcome(runner_context)? {
        Outcome::Skipped { reason } if reason.contains(&text) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a skip mentioning {text:?}, got {other:?}"
        ))),
    }
}

#[then("cleanup ran \"{first}\" then \"{second}\"")]
fn cleanup_ran_in_order(
    runner_context: &RunnerContext,
    first: String,
    second: String,
) -> Result<(), StepError> {
    let performed = performed_labels(runner_context);
    if performed == [first.clone(), second.clone()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected cleanup [{first}, {second}], got {performed:?}"
        )))
    }
}

#[then("cleanup ran only \"{action}\"")]
fn cleanup_ran_only(runner_context: &RunnerContext, action: String) -> Result<(), StepError> {
    let performed = performed_labels(runner_context);
    if performed == [action.clone()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected cleanup [{action}], got {performed:?}"
        )))
    }
}

#[then("no cleanup ran")]
fn no_cleanup(runner_context: &RunnerContext) -> Result<(), StepError> {
    if runner_context.performed.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no cleanup, got {:?}",
            runner_context.performed
        )))
    }
}
