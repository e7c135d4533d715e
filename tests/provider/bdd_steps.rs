//! BDD step definitions for provider config loading.

use rstest_bdd_macros::{given, then, when};
use sdk_test::{CloudProviderConfig, ProviderConfigError, ProviderCredential};

use super::test_helpers::{AWS_AND_AZURE, ProviderContext};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn loaded(provider_context: &ProviderContext) -> Result<&CloudProviderConfig, StepError> {
    match &provider_context.result {
        Some(Ok(config)) => Ok(config),
        other => Err(StepError::Assertion(format!(
            "expected a loaded provider config, got {other:?}"
        ))),
    }
}

#[given("a provider file with aws and azure entries")]
fn aws_and_azure(provider_context: ProviderContext) -> ProviderContext {
    provider_context.write(AWS_AND_AZURE);
    provider_context
}

#[given("a provider file with an unsupported \"{provider}\" entry")]
fn unsupported_provider(provider_context: ProviderContext, provider: String) -> ProviderContext {
    provider_context.write(&format!(
        "CloudProviders:\n  {provider}:\n    CredName: unsupported\n"
    ));
    provider_context
}

#[given("a provider file path that does not exist")]
fn missing_file(provider_context: ProviderContext) -> ProviderContext {
    provider_context
}

#[given("a provider file containing \"{contents}\"")]
fn file_containing(provider_context: ProviderContext, contents: String) -> ProviderContext {
    provider_context.write(&contents);
    provider_context
}

#[when("the provider file is loaded")]
fn load_file(mut provider_context: ProviderContext) -> ProviderContext {
    provider_context.result = Some(CloudProviderConfig::load(&provider_context.path));
    provider_context
}

#[then("the loaded providers are \"{names}\"")]
fn loaded_providers(provider_context: &ProviderContext, names: String) -> Result<(), StepError> {
    let actual: Vec<_> = loaded(provider_context)?
        .credentials()
        .iter()
        .map(ProviderCredential::provider)
        .collect();
    let expected: Vec<_> = names.split(',').map(str::trim).collect();
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected providers {expected:?}, got {actual:?}"
        )))
    }
}

#[then("no providers are loaded")]
fn no_providers(provider_context: &ProviderContext) -> Result<(), StepError> {
    let credentials = loaded(provider_context)?.credentials();
    if credentials.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no usable providers, got {credentials:?}"
        )))
    }
}

#[then("the aws credential uses region \"{region}\"")]
fn aws_region(provider_context: &ProviderContext, region: String) -> Result<(), StepError> {
    match loaded(provider_context)?.credential("aws") {
        Some(ProviderCredential::Aws {
            region: actual,
            disable_ssl: false,
            ..
        }) if actual == region => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected an aws credential in {region} with TLS enabled, got {other:?}"
        ))),
    }
}

#[then("loading fails with a read error")]
fn read_error(provider_context: &ProviderContext) -> Result<(), StepError> {
    match &provider_context.result {
        Some(Err(ProviderConfigError::Read { path, .. })) if *path == provider_context.path => {
            Ok(())
        }
        other => Err(StepError::Assertion(format!(
            "expected a read error for {}, got {other:?}",
            provider_context.path
        ))),
    }
}

#[then("loading fails with a parse error")]
fn parse_error(provider_context: &ProviderContext) -> Result<(), StepError> {
    match &provider_context.result {
        Some(Err(ProviderConfigError::Parse { .. })) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a parse error, got {other:?}"
        ))),
    }
}
