//! Runs catalogue scenarios one after another and collects their outcomes.
//!
//! For each scenario the runner applies the focus filter, skips known issues
//! unless asked to run them, checks prerequisites, executes the body inside a
//! tracing span and then drains the scenario's [`Teardown`]. Cleanup runs
//! whatever the body returned; a failing cleanup fails the scenario.

use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, info, info_span, warn};

use crate::suite::{
    CleanupError, CleanupTarget, Group, Requirement, Scenario, ScenarioError, Session, Teardown,
};

/// Result of one scenario.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Outcome {
    /// The body and its teardown succeeded.
    Passed,
    /// The scenario did not run.
    Skipped {
        /// Why it did not run.
        reason: String,
    },
    /// The body or its teardown failed.
    Failed {
        /// Failure description, including teardown failures.
        message: String,
    },
}

impl Outcome {
    /// Whether this outcome counts against the run.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Combines a body result with the cleanup failures that followed it.
#[must_use]
pub fn settle(body: Result<(), ScenarioError>, cleanup_failures: &[CleanupError]) -> Outcome {
    let teardown = teardown_summary(cleanup_failures);
    match (body, teardown) {
        (Ok(()), None) => Outcome::Passed,
        (Ok(()), Some(note)) => Outcome::Failed {
            message: format!("teardown failed: {note}"),
        },
        (Err(ScenarioError::Skipped(reason)), None) => Outcome::Skipped { reason },
        (Err(ScenarioError::Skipped(reason)), Some(note)) => Outcome::Failed {
            message: format!("skipped ({reason}) but teardown failed: {note}"),
        },
        (Err(err), note) => Outcome::Failed {
            message: append_teardown_note(err.to_string(), note.as_deref()),
        },
    }
}

fn teardown_summary(failures: &[CleanupError]) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    Some(
        failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    )
}

fn append_teardown_note(message: String, teardown: Option<&str>) -> String {
    if let Some(note) = teardown {
        format!("{message} (teardown also failed: {note})")
    } else {
        message
    }
}

/// Run-wide switches taken from the command line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Groups to run. Empty means every group.
    pub focus: Vec<Group>,
    /// Run known-issue scenarios instead of skipping them.
    pub run_known_issues: bool,
}

impl RunOptions {
    fn selects(&self, group: Group) -> bool {
        self.focus.is_empty() || self.focus.contains(&group)
    }
}

/// Outcome of one scenario as it appears in the report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScenarioRecord {
    /// Resource area.
    pub group: Group,
    /// Scenario name.
    pub name: &'static str,
    /// What happened.
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Wall time spent on the body and teardown.
    pub elapsed_ms: u64,
}

/// Every record of a run plus summary counts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    /// Scenarios that passed.
    pub passed: usize,
    /// Scenarios that were skipped.
    pub skipped: usize,
    /// Scenarios that failed.
    pub failed: usize,
    /// Per-scenario records in execution order.
    pub scenarios: Vec<ScenarioRecord>,
}

impl SuiteReport {
    /// Appends a record and updates the counts.
    pub fn record(&mut self, record: ScenarioRecord) {
        match record.outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
        self.scenarios.push(record);
    }

    /// Process exit status: 1 when any scenario failed, 0 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.failed > 0)
    }

    /// One-line summary for the terminal.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "{total} scenarios: {passed} passed, {skipped} skipped, {failed} failed",
            total = self.scenarios.len(),
            passed = self.passed,
            skipped = self.skipped,
            failed = self.failed,
        )
    }

    /// Failed records, for printing after the summary.
    pub fn failures(&self) -> impl Iterator<Item = &ScenarioRecord> {
        self.scenarios
            .iter()
            .filter(|record| record.outcome.is_failure())
    }

    /// Writes the report as pretty-printed JSON to `path`, replacing any
    /// existing file.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Report`] when serialisation fails and
    /// [`RunnerError::Io`] when the file cannot be written.
    pub fn write_json(&self, path: &Utf8Path) -> Result<(), RunnerError> {
        let body = serde_json::to_vec_pretty(self)
            .map_err(|err| RunnerError::Report(err.to_string()))?;
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let file_name = path.file_name().ok_or_else(|| RunnerError::Io {
            path: path.to_path_buf(),
            message: String::from("report path is missing a filename"),
        })?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| {
            RunnerError::Io {
                path: parent.to_path_buf(),
                message: err.to_string(),
            }
        })?;
        dir.write(file_name, body).map_err(|err| RunnerError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

/// Errors raised while producing the report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunnerError {
    /// The report could not be serialised.
    #[error("failed to serialise report: {0}")]
    Report(String),
    /// The report file could not be written.
    #[error("failed to write report {path}: {message}")]
    Io {
        /// Path that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        message: String,
    },
}

/// Executes scenarios against a session. Cleanup goes through `cleanup`,
/// which is the session itself outside tests.
#[derive(Debug)]
pub struct Runner<'s, T: ?Sized> {
    session: &'s Session,
    cleanup: &'s T,
    options: RunOptions,
}

impl<'s> Runner<'s, Session> {
    /// Creates a runner that cleans up through the session's own clients.
    #[must_use]
    pub const fn for_session(session: &'s Session, options: RunOptions) -> Self {
        Self::new(session, session, options)
    }
}

impl<'s, T> Runner<'s, T>
where
    T: CleanupTarget + ?Sized,
{
    /// Creates a runner with a separate cleanup target.
    #[must_use]
    pub const fn new(session: &'s Session, cleanup: &'s T, options: RunOptions) -> Self {
        Self {
            session,
            cleanup,
            options,
        }
    }

    /// Runs every selected scenario in order. Scenarios outside the focus are
    /// left out of the report.
    #[must_use]
    pub async fn run(&self, scenarios: &[Scenario]) -> SuiteReport {
        let mut report = SuiteReport::default();
        for scenario in scenarios
            .iter()
            .filter(|scenario| self.options.selects(scenario.group))
        {
            let started = Instant::now();
            let outcome = self.run_scenario(scenario).await;
            report.record(ScenarioRecord {
                group: scenario.group,
                name: scenario.name,
                outcome,
                elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            });
        }
        report
    }

    /// Runs one scenario, including its prerequisite checks and teardown.
    #[must_use]
    pub async fn run_scenario(&self, scenario: &Scenario) -> Outcome {
        let span = info_span!("scenario", group = %scenario.group, scenario = scenario.name);
        let outcome = self.evaluate(scenario).instrument(span.clone()).await;
        span.in_scope(|| match &outcome {
            Outcome::Passed => info!("passed"),
            Outcome::Skipped { reason } => info!(%reason, "skipped"),
            Outcome::Failed { message } => warn!(%message, "failed"),
        });
        outcome
    }

    async fn evaluate(&self, scenario: &Scenario) -> Outcome {
        if let Some(note) = scenario
            .known_issue
            .filter(|_| !self.options.run_known_issues)
        {
            return Outcome::Skipped {
                reason: format!("known issue: {note}"),
            };
        }
        match self.unmet_requirement(scenario.requires).await {
            Ok(Some(reason)) => return Outcome::Skipped { reason },
            Ok(None) => {}
            Err(err) => {
                return Outcome::Failed {
                    message: format!("prerequisite check failed: {err}"),
                };
            }
        }

        let mut teardown = Teardown::new();
        let body = (scenario.run)(self.session, &mut teardown).await;
        let cleanup_failures = teardown.run(self.cleanup).await;
        settle(body, &cleanup_failures)
    }

    async fn unmet_requirement(
        &self,
        requirements: &[Requirement],
    ) -> Result<Option<String>, ScenarioError> {
        for requirement in requirements {
            let reason = match requirement {
                Requirement::Capability(capability) => {
                    if self.session.supports(*capability).await? {
                        continue;
                    }
                    format!("server does not advertise {capability}")
                }
                Requirement::ProviderConfig => {
                    if self.session.providers().is_some() {
                        continue;
                    }
                    String::from("no cloud provider config loaded (--cpg)")
                }
                Requirement::MountPath => {
                    if self.session.mount_path().is_some() {
                        continue;
                    }
                    String::from("no mount path configured (--mount-path)")
                }
                Requirement::SharedSecret => {
                    if self.session.has_shared_secret() {
                        continue;
                    }
                    String::from("no shared secret configured (--shared-secret)")
                }
            };
            return Ok(Some(reason));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests;
