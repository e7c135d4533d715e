//! Configuration loading via `ortho-config`.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::poll::PollPolicy;

/// Default issuer embedded in minted user tokens.
pub const DEFAULT_TOKEN_ISSUER: &str = "openstorage.io";

/// Suite configuration derived from configuration files, environment
/// variables, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SDK",
    discovery(
        app_name = "sdk-test",
        env_var = "SDK_CONFIG_PATH",
        config_file_name = "sdk-test.toml",
        dotfile_name = ".sdk-test.toml",
        project_file_name = "sdk-test.toml"
    )
)]
pub struct SanityConfig {
    /// Address of the SDK server under test. Required.
    #[ortho_config(default = String::new())]
    pub endpoint: String,
    /// Local mount target; mount scenarios are skipped without it.
    pub mount_path: Option<Utf8PathBuf>,
    /// Path to the cloud provider YAML; credential and cloud backup scenarios
    /// are skipped without it.
    pub provider_config: Option<Utf8PathBuf>,
    /// Secret shared with the server for signing user tokens. Role and
    /// ownership scenarios are skipped without it.
    pub shared_secret: Option<String>,
    /// Issuer claim placed in minted tokens.
    #[ortho_config(default = DEFAULT_TOKEN_ISSUER.to_owned())]
    pub token_issuer: String,
    /// Seconds to wait for the gRPC channel to become ready.
    #[ortho_config(default = 60)]
    pub connect_timeout_secs: u64,
    /// Seconds between cloud backup status polls.
    #[ortho_config(default = 10)]
    pub backup_poll_interval_secs: u64,
    /// Initial budget, in seconds, for a cloud backup to reach a terminal state.
    #[ortho_config(default = 300)]
    pub backup_poll_budget_secs: u64,
    /// Hard ceiling, in seconds, that deadline extensions may not cross.
    #[ortho_config(default = 900)]
    pub backup_poll_ceiling_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl SanityConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to sdk-test.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::MissingField(format!(
                "{} must be greater than zero: set {} or {} in sdk-test.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables; the
    /// binary applies its own flags afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("sdk-test")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that supply each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the endpoint is empty or a
    /// timing value is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.endpoint,
            &FieldMetadata::new("SDK server endpoint", "SDK_ENDPOINT", "endpoint"),
        )?;
        Self::require_positive(
            self.connect_timeout_secs,
            &FieldMetadata::new(
                "connect timeout",
                "SDK_CONNECT_TIMEOUT_SECS",
                "connect_timeout_secs",
            ),
        )?;
        Self::require_positive(
            self.backup_poll_interval_secs,
            &FieldMetadata::new(
                "backup poll interval",
                "SDK_BACKUP_POLL_INTERVAL_SECS",
                "backup_poll_interval_secs",
            ),
        )?;
        if self.backup_poll_ceiling_secs < self.backup_poll_budget_secs {
            return Err(ConfigError::Parse(format!(
                "backup_poll_ceiling_secs ({}) must not be lower than backup_poll_budget_secs ({})",
                self.backup_poll_ceiling_secs, self.backup_poll_budget_secs
            )));
        }
        Ok(())
    }

    /// Returns the channel connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Builds the backup poll policy. The extension granted per `Active`
    /// report equals the poll interval.
    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        let interval = Duration::from_secs(self.backup_poll_interval_secs);
        PollPolicy {
            interval,
            budget: Duration::from_secs(self.backup_poll_budget_secs),
            extension: interval,
            ceiling: Duration::from_secs(self.backup_poll_ceiling_secs),
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or invalid.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> SanityConfig {
        SanityConfig {
            endpoint: endpoint.to_owned(),
            mount_path: None,
            provider_config: None,
            shared_secret: None,
            token_issuer: DEFAULT_TOKEN_ISSUER.to_owned(),
            connect_timeout_secs: 60,
            backup_poll_interval_secs: 10,
            backup_poll_budget_secs: 300,
            backup_poll_ceiling_secs: 900,
        }
    }

    #[test]
    fn validate_rejects_blank_endpoint() {
        let err = config("  ").validate().expect_err("blank endpoint");
        let ConfigError::MissingField(message) = err else {
            panic!("unexpected error variant");
        };
        assert!(message.contains("SDK_ENDPOINT"), "message: {message}");
        assert!(message.contains("endpoint"), "message: {message}");
    }

    #[test]
    fn validate_rejects_ceiling_below_budget() {
        let mut cfg = config("localhost:9100");
        cfg.backup_poll_ceiling_secs = 100;
        assert!(matches!(cfg.validate(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut cfg = config("localhost:9100");
        cfg.backup_poll_interval_secs = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn poll_policy_uses_interval_as_extension() {
        let policy = config("localhost:9100").poll_policy();
        assert_eq!(policy.interval, Duration::from_secs(10));
        assert_eq!(policy.extension, Duration::from_secs(10));
        assert_eq!(policy.budget, Duration::from_secs(300));
        assert_eq!(policy.ceiling, Duration::from_secs(900));
    }
}
