//! Cloud provider configuration for credential and cloud backup scenarios.
//!
//! The YAML document maps a provider name (`aws`, `azure`, `google`) to a flat
//! table of string parameters under the top-level `CloudProviders` key:
//!
//! ```yaml
//! CloudProviders:
//!   aws:
//!     CredName: sanity-aws
//!     CredAccessKey: AKIA...
//!     CredSecretKey: secret
//!     CredEndpoint: s3.amazonaws.com
//!     CredRegion: us-east-1
//!     CredDisableSSL: "false"
//! ```

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::api::{
    SdkAwsCredentialRequest, SdkAzureCredentialRequest, SdkCredentialCreateRequest,
    SdkGoogleCredentialRequest, sdk_credential_create_request::CredentialType,
};

const CRED_NAME: &str = "CredName";

/// Parsed cloud provider YAML.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct CloudProviderConfig {
    /// Provider name to parameter table.
    #[serde(rename = "CloudProviders", default)]
    pub cloud_providers: BTreeMap<String, BTreeMap<String, String>>,
}

/// A typed credential for one of the supported providers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderCredential {
    /// Amazon S3 or an S3-compatible object store.
    Aws {
        /// Credential name registered with the server.
        name: String,
        /// Access key identifier.
        access_key: String,
        /// Secret access key.
        secret_key: String,
        /// Object store endpoint.
        endpoint: String,
        /// Bucket region.
        region: String,
        /// Whether TLS is disabled when talking to the endpoint.
        disable_ssl: bool,
    },
    /// Azure blob storage.
    Azure {
        /// Credential name registered with the server.
        name: String,
        /// Storage account name.
        account_name: String,
        /// Storage account key.
        account_key: String,
    },
    /// Google cloud storage.
    Google {
        /// Credential name registered with the server.
        name: String,
        /// Project identifier.
        project_id: String,
        /// Service account JSON key.
        json_key: String,
    },
}

impl ProviderCredential {
    /// Builds a credential from a provider entry. Returns `None` for provider
    /// names the suite does not know; missing parameters become empty strings
    /// so the server decides whether they are acceptable.
    #[must_use]
    pub fn from_params(provider: &str, params: &BTreeMap<String, String>) -> Option<Self> {
        let param = |key: &str| params.get(key).cloned().unwrap_or_default();
        match provider {
            "aws" => Some(Self::Aws {
                name: param(CRED_NAME),
                access_key: param("CredAccessKey"),
                secret_key: param("CredSecretKey"),
                endpoint: param("CredEndpoint"),
                region: param("CredRegion"),
                disable_ssl: params
                    .get("CredDisableSSL")
                    .is_some_and(|value| value == "true"),
            }),
            "azure" => Some(Self::Azure {
                name: param(CRED_NAME),
                account_name: param("CredAccountName"),
                account_key: param("CredAccountKey"),
            }),
            "google" => Some(Self::Google {
                name: param(CRED_NAME),
                project_id: param("CredProjectID"),
                json_key: param("CredJsonKey"),
            }),
            _ => None,
        }
    }

    /// Provider name as it appears in the YAML document.
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        match self {
            Self::Aws { .. } => "aws",
            Self::Azure { .. } => "azure",
            Self::Google { .. } => "google",
        }
    }

    /// Converts the credential into a create request.
    #[must_use]
    pub fn to_request(&self) -> SdkCredentialCreateRequest {
        let (name, credential_type) = match self {
            Self::Aws {
                name,
                access_key,
                secret_key,
                endpoint,
                region,
                disable_ssl,
            } => (
                name,
                CredentialType::AwsCredential(SdkAwsCredentialRequest {
                    access_key: access_key.clone(),
                    secret_key: secret_key.clone(),
                    endpoint: endpoint.clone(),
                    region: region.clone(),
                    disable_ssl: *disable_ssl,
                }),
            ),
            Self::Azure {
                name,
                account_name,
                account_key,
            } => (
                name,
                CredentialType::AzureCredential(SdkAzureCredentialRequest {
                    account_name: account_name.clone(),
                    account_key: account_key.clone(),
                }),
            ),
            Self::Google {
                name,
                project_id,
                json_key,
            } => (
                name,
                CredentialType::GoogleCredential(SdkGoogleCredentialRequest {
                    project_id: project_id.clone(),
                    json_key: json_key.clone(),
                }),
            ),
        };
        SdkCredentialCreateRequest {
            name: name.clone(),
            credential_type: Some(credential_type),
            ..SdkCredentialCreateRequest::default()
        }
    }
}

impl CloudProviderConfig {
    /// Reads and parses the provider YAML at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderConfigError::Read`] when the file cannot be read and
    /// [`ProviderConfigError::Parse`] when it is not valid provider YAML.
    pub fn load(path: &Utf8Path) -> Result<Self, ProviderConfigError> {
        let contents = read_file(path)?;
        Self::parse(path, &contents)
    }

    /// Parses provider YAML already held in memory. `path` is only used in
    /// error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderConfigError::Parse`] when the document is malformed.
    pub fn parse(path: &Utf8Path, contents: &str) -> Result<Self, ProviderConfigError> {
        serde_yaml::from_str(contents).map_err(|err| ProviderConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Returns typed credentials for every known provider, in provider-name
    /// order. Unknown providers are logged and ignored.
    #[must_use]
    pub fn credentials(&self) -> Vec<ProviderCredential> {
        self.cloud_providers
            .iter()
            .filter_map(|(provider, params)| {
                let credential = ProviderCredential::from_params(provider, params);
                if credential.is_none() {
                    warn!(provider = %provider, "ignoring unsupported cloud provider");
                }
                credential
            })
            .collect()
    }

    /// Returns the credential for the named provider, if configured.
    #[must_use]
    pub fn credential(&self, provider: &str) -> Option<ProviderCredential> {
        self.cloud_providers
            .get(provider)
            .and_then(|params| ProviderCredential::from_params(provider, params))
    }
}

fn read_file(path: &Utf8Path) -> Result<String, ProviderConfigError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| ProviderConfigError::Read {
        path: path.to_path_buf(),
        message: String::from("provider config path is missing a filename"),
    })?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| {
        ProviderConfigError::Read {
            path: parent.to_path_buf(),
            message: err.to_string(),
        }
    })?;

    dir.read_to_string(file_name)
        .map_err(|err| ProviderConfigError::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

/// Errors raised while loading the cloud provider YAML.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderConfigError {
    /// The file or its parent directory could not be read.
    #[error("failed to read provider config {path}: {message}")]
    Read {
        /// Path that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        message: String,
    },
    /// The file is not valid provider YAML.
    #[error("failed to parse provider config {path}: {message}")]
    Parse {
        /// Path of the malformed document.
        path: Utf8PathBuf,
        /// Parser diagnostic.
        message: String,
    },
}
