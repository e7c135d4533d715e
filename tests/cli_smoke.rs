//! Smoke tests for the `sdk-test` binary.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

const SDK_VARS: &[&str] = &[
    "SDK_ENDPOINT",
    "SDK_CONFIG_PATH",
    "SDK_MOUNT_PATH",
    "SDK_PROVIDER_CONFIG",
    "SDK_SHARED_SECRET",
];

fn sdk_test() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("sdk-test");
    for var in SDK_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn version_flag_prints_the_package_version() {
    sdk_test()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_endpoint_names_the_environment_variable() {
    sdk_test()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("SDK_ENDPOINT"));
}

#[test]
fn unknown_focus_group_is_rejected_before_connecting() {
    sdk_test()
        .args(["--endpoint", "localhost:9100", "--focus", "volumes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid --focus value"))
        .stderr(predicate::str::contains("schedule-policy"));
}

#[test]
fn unreachable_endpoint_fails_after_the_connect_timeout() {
    sdk_test()
        .args(["--endpoint", "127.0.0.1:1"])
        .env("SDK_CONNECT_TIMEOUT_SECS", "1")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot reach SDK server"));
}
