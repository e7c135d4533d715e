//! Binary entry point for the `sdk-test` conformance suite.

use std::io::{self, Write};
use std::process;

use camino::Utf8Path;
use clap::Parser;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sdk_test::{
    AuthError, CloudProviderConfig, ConfigError, ConnectionError, Group, Outcome, RunOptions,
    Runner, RunnerError, SanityConfig, Session, SuiteReport, UnknownGroup, catalogue, connect,
};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid --focus value: {0}")]
    Focus(#[from] UnknownGroup),
    #[error("cannot reach SDK server: {0}")]
    Connection(#[from] ConnectionError),
    #[error("cannot prepare the admin token: {0}")]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Report(#[from] RunnerError),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match run(&cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<i32, CliError> {
    let options = run_options(cli)?;
    let mut config = SanityConfig::load_without_cli_args()?;
    apply_overrides(&mut config, cli);
    config.validate()?;

    let providers = load_providers(config.provider_config.as_deref());
    let channel = connect(&config.endpoint, config.connect_timeout()).await?;
    info!(endpoint = %config.endpoint, "connected to SDK server");
    let session = Session::new(channel, config, providers)?;

    let report = Runner::for_session(&session, options)
        .run(&catalogue())
        .await;
    write_summary(io::stdout(), &report);
    if let Some(path) = &cli.report {
        report.write_json(path)?;
    }
    Ok(report.exit_code())
}

fn run_options(cli: &Cli) -> Result<RunOptions, UnknownGroup> {
    let focus = cli
        .focus
        .iter()
        .map(|name| name.parse::<Group>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RunOptions {
        focus,
        run_known_issues: cli.run_known_issues,
    })
}

fn apply_overrides(config: &mut SanityConfig, cli: &Cli) {
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint.clone_from(endpoint);
    }
    if cli.mount_path.is_some() {
        config.mount_path.clone_from(&cli.mount_path);
    }
    if cli.provider_config.is_some() {
        config.provider_config.clone_from(&cli.provider_config);
    }
    if cli.shared_secret.is_some() {
        config.shared_secret.clone_from(&cli.shared_secret);
    }
}

fn load_providers(configured: Option<&Utf8Path>) -> Option<CloudProviderConfig> {
    CloudProviderConfig::load(configured?)
        .inspect_err(|err| {
            warn!(error = %err, "cloud provider config unusable; cloud scenarios will be skipped");
        })
        .ok()
}

fn write_summary(mut target: impl Write, report: &SuiteReport) {
    for record in report.failures() {
        if let Outcome::Failed { message } = &record.outcome {
            writeln!(target, "FAILED {}/{}: {message}", record.group, record.name).ok();
        }
    }
    writeln!(target, "{}", report.summary_line()).ok();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use rstest::rstest;
    use sdk_test::ScenarioRecord;
    use sdk_test::test_support::offline_config;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sdk-test").chain(args.iter().copied()))
            .expect("arguments parse")
    }

    #[test]
    fn focus_names_become_groups() {
        let options = run_options(&parse(&["--focus", "cloud-backup", "--focus", "node"]))
            .expect("known groups");

        assert_eq!(options.focus, vec![Group::CloudBackup, Group::Node]);
        assert!(!options.run_known_issues);
    }

    #[test]
    fn unknown_focus_is_rejected() {
        let err = run_options(&parse(&["--focus", "volumes"])).expect_err("unknown group");

        assert_eq!(err, UnknownGroup(String::from("volumes")));
    }

    #[rstest]
    #[case::endpoint(&["--endpoint", "localhost:9100"])]
    #[case::mount(&["--mount-path", "/mnt/sanity"])]
    #[case::cpg(&["--cpg", "/etc/sanity/cb.yaml"])]
    #[case::secret(&["--shared-secret", "hush"])]
    fn flags_override_loaded_values(#[case] args: &[&str]) {
        let mut config = offline_config();
        let cli = parse(args);

        apply_overrides(&mut config, &cli);

        let expected = cli.endpoint.unwrap_or_else(|| offline_config().endpoint);
        assert_eq!(config.endpoint, expected);
        assert_eq!(config.mount_path, cli.mount_path);
        assert_eq!(config.provider_config, cli.provider_config);
        assert_eq!(config.shared_secret, cli.shared_secret);
    }

    #[test]
    fn absent_flags_keep_loaded_values() {
        let mut config = offline_config();
        config.mount_path = Some(Utf8PathBuf::from("/mnt/from-file"));

        apply_overrides(&mut config, &parse(&[]));

        assert_eq!(config.mount_path, Some(Utf8PathBuf::from("/mnt/from-file")));
    }

    #[test]
    fn unreadable_provider_config_is_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = Utf8PathBuf::from_path_buf(dir.path().join("cb.yaml")).expect("utf-8 path");

        assert!(load_providers(Some(&missing)).is_none());
        assert!(load_providers(None).is_none());
    }

    #[test]
    fn summary_lists_failures_before_the_counts() {
        let mut report = SuiteReport::default();
        report.record(ScenarioRecord {
            group: Group::Volume,
            name: "create",
            outcome: Outcome::Failed {
                message: String::from("Volume.Create failed with Internal: boom"),
            },
            elapsed_ms: 5,
        });
        let mut buffer = Vec::new();

        write_summary(&mut buffer, &report);

        let text = String::from_utf8(buffer).expect("utf-8 output");
        assert_eq!(
            text,
            "FAILED volume/create: Volume.Create failed with Internal: boom\n\
             1 scenarios: 0 passed, 0 skipped, 1 failed\n"
        );
    }

    #[test]
    fn write_error_appends_newline() {
        let mut buffer = Vec::new();
        write_error(
            &mut buffer,
            &CliError::Focus(UnknownGroup(String::from("volumes"))),
        );

        let text = String::from_utf8(buffer).expect("utf-8 output");
        assert!(text.starts_with("invalid --focus value"), "text: {text}");
        assert!(text.ends_with('\n'));
    }
}
