//! Command-line interface definitions for the `sdk-test` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use camino::Utf8PathBuf;
use clap::Parser;

/// Top-level CLI for the `sdk-test` binary.
#[derive(Debug, Parser)]
#[command(
    name = "sdk-test",
    version,
    about = "Run the OpenStorage SDK sanity suite against a live gRPC endpoint"
)]
pub(crate) struct Cli {
    /// Address of the SDK server: `host:port`, a URI, or a unix socket path.
    ///
    /// Overrides `SDK_ENDPOINT` and the `endpoint` key in `sdk-test.toml`.
    #[arg(long, value_name = "ADDRESS")]
    pub(crate) endpoint: Option<String>,
    /// Local directory used as the target of mount and unmount scenarios.
    #[arg(long, value_name = "PATH")]
    pub(crate) mount_path: Option<Utf8PathBuf>,
    /// Cloud provider YAML used by the credential and cloud backup scenarios.
    #[arg(long = "cpg", value_name = "PATH")]
    pub(crate) provider_config: Option<Utf8PathBuf>,
    /// Shared secret used to mint user tokens for role and ownership scenarios.
    #[arg(long, value_name = "SECRET")]
    pub(crate) shared_secret: Option<String>,
    /// Restrict the run to the named scenario groups (repeatable).
    #[arg(long, value_name = "GROUP")]
    pub(crate) focus: Vec<String>,
    /// Run scenarios registered as known issues instead of skipping them.
    #[arg(long)]
    pub(crate) run_known_issues: bool,
    /// Write a JSON report of every scenario outcome to this path.
    #[arg(long, value_name = "PATH")]
    pub(crate) report: Option<Utf8PathBuf>,
}
