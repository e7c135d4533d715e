//! Shared fixtures and scenario bodies for runner BDD scenarios.

use camino::Utf8PathBuf;
use rstest::fixture;
use sdk_test::suite::{ScenarioFn, ScenarioFuture};
use sdk_test::test_support::{RecordingCleanupTarget, offline_config, offline_session};
use sdk_test::{
    AuthError, Capability, CleanupAction, Group, Outcome, Requirement, RunOptions, Runner,
    Scenario, ScenarioError, Session, Teardown,
};
use thiserror::Error;
use tokio::runtime::Runtime;

const VOLUME: &[Requirement] = &[Requirement::Capability(Capability::Volume)];
const MOUNT_PATH: &[Requirement] = &[Requirement::MountPath];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Body {
    #[default]
    Passes,
    AttachesAndPasses,
    CreatesAndFails,
}

#[derive(Clone, Debug, Default)]
pub struct RunnerContext {
    pub body: Body,
    pub known_issue: bool,
    pub needs_mount_path: bool,
    pub mount_path: Option<Utf8PathBuf>,
    pub options: RunOptions,
    pub failing_cleanup: Vec<CleanupAction>,
    pub outcome: Option<Outcome>,
    pub performed: Vec<CleanupAction>,
}

#[derive(Debug, Error)]
pub enum RunnerTestError {
    #[error("runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Session(#[from] AuthError),
}

#[fixture]
pub fn runner_context() -> RunnerContext {
    RunnerContext::default()
}

pub fn detach_vol_1() -> CleanupAction {
    CleanupAction::DetachVolume {
        volume_id: String::from("vol-1"),
    }
}

fn passes<'a>(_: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move { Ok(()) })
}

fn attaches_and_passes<'a>(_: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        teardown.push(CleanupAction::delete_volume("vol-1"));
        teardown.push(detach_vol_1());
        Ok(())
    })
}

fn creates_and_fails<'a>(_: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        teardown.push(CleanupAction::delete_volume("vol-1"));
        Err(ScenarioError::Assertion(String::from("size mismatch")))
    })
}

fn build_scenario(context: &RunnerContext) -> Scenario {
    let run: ScenarioFn = match context.body {
        Body::Passes => passes,
        Body::AttachesAndPasses => attaches_and_passes,
        Body::CreatesAndFails => creates_and_fails,
    };
    let requires = if context.needs_mount_path {
        MOUNT_PATH
    } else {
        VOLUME
    };
    let scenario = Scenario::new(Group::Volume, "under test", requires, run);
    if context.known_issue {
        scenario.known_issue("reference driver disagrees")
    } else {
        scenario
    }
}

/// Runs the configured scenario against an offline session and records the
/// outcome and the cleanup actions performed.
pub fn execute(mut context: RunnerContext) -> Result<RunnerContext, RunnerTestError> {
    let runtime = Runtime::new()?;
    let scenario = build_scenario(&context);
    let target = RecordingCleanupTarget::default();
    for action in &context.failing_cleanup {
        target.fail_on(action.clone());
    }
    let mut config = offline_config();
    config.mount_path.clone_from(&context.mount_path);

    let outcome = runtime.block_on(async {
        let session = offline_session(config, None)?;
        assert!(session.seed_capabilities(&[Capability::Volume]));
        let runner = Runner::new(&session, &target, context.options.clone());
        Ok::<_, RunnerTestError>(runner.run_scenario(&scenario).await)
    })?;

    context.outcome = Some(outcome);
    context.performed = target.performed();
    Ok(context)
}
