//! Unit tests for scenario execution and reporting.

use camino::Utf8PathBuf;
use rstest::rstest;
use serde_json::Value;

use super::*;
use crate::capability::Capability;
use crate::config::SanityConfig;
use crate::suite::{CleanupAction, ScenarioFuture};
use crate::test_support::{RecordingCleanupTarget, offline_config, offline_session};

const VOLUME: &[Requirement] = &[Requirement::Capability(Capability::Volume)];
const CLUSTER: &[Requirement] = &[Requirement::Capability(Capability::Cluster)];

fn detach_vol_1() -> CleanupAction {
    CleanupAction::DetachVolume {
        volume_id: String::from("vol-1"),
    }
}

fn attaches_and_passes<'a>(_: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        teardown.push(CleanupAction::delete_volume("vol-1"));
        teardown.push(detach_vol_1());
        Ok(())
    })
}

fn creates_then_fails<'a>(_: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        teardown.push(CleanupAction::delete_volume("vol-2"));
        Err(ScenarioError::Assertion(String::from("size: expected 1, got 2")))
    })
}

fn skips_at_runtime<'a>(_: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move { Err(ScenarioError::Skipped(String::from("no alerts raised"))) })
}

fn passes<'a>(_: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move { Ok(()) })
}

fn session_with(config: SanityConfig) -> Session {
    let session = offline_session(config, None).expect("session builds");
    assert!(session.seed_capabilities(&[Capability::Volume]));
    session
}

async fn run_one(scenario: &Scenario, options: RunOptions) -> (Outcome, Vec<CleanupAction>) {
    let session = session_with(offline_config());
    let target = RecordingCleanupTarget::default();
    let outcome = Runner::new(&session, &target, options)
        .run_scenario(scenario)
        .await;
    (outcome, target.performed())
}

#[tokio::test]
async fn passing_scenario_cleans_up_in_reverse_order() {
    let scenario = Scenario::new(Group::Volume, "attach", VOLUME, attaches_and_passes);

    let (outcome, performed) = run_one(&scenario, RunOptions::default()).await;

    assert_eq!(outcome, Outcome::Passed);
    assert_eq!(
        performed,
        vec![detach_vol_1(), CleanupAction::delete_volume("vol-1")]
    );
}

#[tokio::test]
async fn teardown_runs_after_a_failing_body() {
    let scenario = Scenario::new(Group::Volume, "create", VOLUME, creates_then_fails);

    let (outcome, performed) = run_one(&scenario, RunOptions::default()).await;

    let Outcome::Failed { message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(message.contains("size: expected 1, got 2"), "message: {message}");
    assert_eq!(performed, vec![CleanupAction::delete_volume("vol-2")]);
}

#[tokio::test]
async fn cleanup_failure_fails_a_passing_scenario() {
    let session = session_with(offline_config());
    let target = RecordingCleanupTarget::default();
    target.fail_on(detach_vol_1());
    let scenario = Scenario::new(Group::Volume, "attach", VOLUME, attaches_and_passes);

    let outcome = Runner::new(&session, &target, RunOptions::default())
        .run_scenario(&scenario)
        .await;

    let Outcome::Failed { message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(message.starts_with("teardown failed"), "message: {message}");
    assert!(message.contains("detach volume vol-1"), "message: {message}");
    assert_eq!(target.performed().len(), 2);
}

#[tokio::test]
async fn known_issues_are_skipped_unless_requested() {
    let scenario =
        Scenario::new(Group::Volume, "duplicate", VOLUME, passes).known_issue("driver allows it");

    let (skipped, _) = run_one(&scenario, RunOptions::default()).await;
    let (ran, _) = run_one(
        &scenario,
        RunOptions {
            run_known_issues: true,
            ..RunOptions::default()
        },
    )
    .await;

    assert_eq!(
        skipped,
        Outcome::Skipped {
            reason: String::from("known issue: driver allows it"),
        }
    );
    assert_eq!(ran, Outcome::Passed);
}

#[tokio::test]
async fn unadvertised_capability_skips_without_running_the_body() {
    let scenario = Scenario::new(Group::Cluster, "alerts", CLUSTER, attaches_and_passes);

    let (outcome, performed) = run_one(&scenario, RunOptions::default()).await;

    let Outcome::Skipped { reason } = outcome else {
        panic!("expected skip, got {outcome:?}");
    };
    assert!(reason.contains("CLUSTER"), "reason: {reason}");
    assert!(performed.is_empty());
}

#[rstest]
#[case::mount(&[Requirement::MountPath], "--mount-path")]
#[case::secret(&[Requirement::SharedSecret], "--shared-secret")]
#[case::providers(&[Requirement::ProviderConfig], "--cpg")]
#[tokio::test]
async fn missing_inputs_skip_with_the_flag_name(
    #[case] requires: &'static [Requirement],
    #[case] flag: &str,
) {
    let scenario = Scenario::new(Group::Volume, "needs input", requires, passes);

    let (outcome, _) = run_one(&scenario, RunOptions::default()).await;

    let Outcome::Skipped { reason } = outcome else {
        panic!("expected skip, got {outcome:?}");
    };
    assert!(reason.contains(flag), "reason: {reason}");
}

#[tokio::test]
async fn configured_inputs_satisfy_requirements() {
    let mut config = offline_config();
    config.mount_path = Some(Utf8PathBuf::from("/mnt/sanity"));
    config.shared_secret = Some(String::from("secret"));
    let session = session_with(config);
    let target = RecordingCleanupTarget::default();
    let scenario = Scenario::new(
        Group::Ownership,
        "needs inputs",
        &[Requirement::MountPath, Requirement::SharedSecret],
        passes,
    );

    let outcome = Runner::new(&session, &target, RunOptions::default())
        .run_scenario(&scenario)
        .await;

    assert_eq!(outcome, Outcome::Passed);
}

#[tokio::test]
async fn runtime_skip_is_reported_as_skipped() {
    let scenario = Scenario::new(Group::Cluster, "alert clear", &[], skips_at_runtime);

    let (outcome, _) = run_one(&scenario, RunOptions::default()).await;

    assert_eq!(
        outcome,
        Outcome::Skipped {
            reason: String::from("no alerts raised"),
        }
    );
}

#[tokio::test]
async fn focus_leaves_other_groups_out_of_the_report() {
    let session = session_with(offline_config());
    let target = RecordingCleanupTarget::default();
    let scenarios = [
        Scenario::new(Group::Volume, "attach", VOLUME, attaches_and_passes),
        Scenario::new(Group::Node, "enumerate", &[], passes),
    ];
    let options = RunOptions {
        focus: vec![Group::Node],
        ..RunOptions::default()
    };

    let report = Runner::new(&session, &target, options).run(&scenarios).await;

    assert_eq!(report.scenarios.len(), 1);
    assert_eq!(report.passed, 1);
    assert!(target.performed().is_empty());
}

#[tokio::test]
async fn report_counts_and_exit_code_follow_failures() {
    let session = session_with(offline_config());
    let target = RecordingCleanupTarget::default();
    let scenarios = [
        Scenario::new(Group::Volume, "attach", VOLUME, attaches_and_passes),
        Scenario::new(Group::Volume, "create", VOLUME, creates_then_fails),
        Scenario::new(Group::Cluster, "alert clear", &[], skips_at_runtime),
    ];

    let report = Runner::new(&session, &target, RunOptions::default())
        .run(&scenarios)
        .await;

    assert_eq!((report.passed, report.skipped, report.failed), (1, 1, 1));
    assert_eq!(report.exit_code(), 1);
    assert_eq!(
        report.summary_line(),
        "3 scenarios: 1 passed, 1 skipped, 1 failed"
    );
    assert_eq!(report.failures().count(), 1);
}

#[test]
fn clean_report_exits_zero() {
    let mut report = SuiteReport::default();
    report.record(ScenarioRecord {
        group: Group::Node,
        name: "enumerate",
        outcome: Outcome::Passed,
        elapsed_ms: 3,
    });
    report.record(ScenarioRecord {
        group: Group::Role,
        name: "lifecycle",
        outcome: Outcome::Skipped {
            reason: String::from("no shared secret"),
        },
        elapsed_ms: 0,
    });

    assert_eq!(report.exit_code(), 0);
}

#[test]
fn settle_appends_teardown_failures_to_body_errors() {
    let failures = [CleanupError {
        action: CleanupAction::delete_volume("vol-9"),
        message: String::from("Internal: busy"),
    }];

    let outcome = settle(
        Err(ScenarioError::Assertion(String::from("mismatch"))),
        &failures,
    );

    assert_eq!(
        outcome,
        Outcome::Failed {
            message: String::from(
                "assertion failed: mismatch \
                 (teardown also failed: delete volume vol-9: Internal: busy)"
            ),
        }
    );
}

#[test]
fn settle_turns_a_skip_with_failed_cleanup_into_a_failure() {
    let failures = [CleanupError {
        action: CleanupAction::delete_volume("vol-9"),
        message: String::from("Internal: busy"),
    }];

    let outcome = settle(Err(ScenarioError::Skipped(String::from("none"))), &failures);

    assert!(outcome.is_failure());
}

#[test]
fn write_json_records_outcomes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("report.json")).expect("utf-8 path");
    let mut report = SuiteReport::default();
    report.record(ScenarioRecord {
        group: Group::CloudBackup,
        name: "restore",
        outcome: Outcome::Failed {
            message: String::from("CloudBackup.Restore failed"),
        },
        elapsed_ms: 12,
    });

    report.write_json(&path).expect("report written");

    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read report"))
            .expect("valid json");
    assert_eq!(written.get("failed"), Some(&Value::from(1)));
    assert_eq!(
        written.pointer("/scenarios/0/group"),
        Some(&Value::from("cloud-backup"))
    );
    assert_eq!(
        written.pointer("/scenarios/0/outcome"),
        Some(&Value::from("failed"))
    );
    assert_eq!(
        written.pointer("/scenarios/0/message"),
        Some(&Value::from("CloudBackup.Restore failed"))
    );
}

#[test]
fn write_json_reports_a_missing_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("absent").join("report.json"))
        .expect("utf-8 path");

    let err = SuiteReport::default()
        .write_json(&path)
        .expect_err("parent directory is missing");

    assert!(matches!(err, RunnerError::Io { .. }));
}
