//! Shared fixtures for provider config scenarios.

use std::fs::write;
use std::sync::Arc;

use camino::Utf8PathBuf;
use rstest::fixture;
use sdk_test::{CloudProviderConfig, ProviderConfigError};
use tempfile::TempDir;

pub const AWS_AND_AZURE: &str = "\
CloudProviders:
  aws:
    CredName: sanity-aws
    CredAccessKey: access
    CredSecretKey: secret
    CredEndpoint: s3.example.com
    CredRegion: eu-west-1
    CredDisableSSL: \"false\"
  azure:
    CredName: sanity-azure
    CredAccountName: account
    CredAccountKey: key
";

#[derive(Clone, Debug)]
pub struct ProviderContext {
    pub path: Utf8PathBuf,
    pub result: Option<Result<CloudProviderConfig, ProviderConfigError>>,
    _dir: Arc<TempDir>,
}

impl ProviderContext {
    /// Writes `contents` to the provider file.
    pub fn write(&self, contents: &str) {
        write(&self.path, contents)
            .unwrap_or_else(|err| panic!("write provider file {}: {err}", self.path));
    }
}

#[fixture]
pub fn provider_context() -> ProviderContext {
    let dir = TempDir::new().unwrap_or_else(|err| panic!("create temp dir: {err}"));
    let path = Utf8PathBuf::from_path_buf(dir.path().join("cb.yaml"))
        .unwrap_or_else(|path| panic!("temp path {} is not UTF-8", path.display()));
    ProviderContext {
        path,
        result: None,
        _dir: Arc::new(dir),
    }
}
