//! BDD scenarios for provider config loading.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ProviderContext, provider_context};

#[scenario(
    path = "tests/features/provider.feature",
    name = "Load AWS and Azure credentials"
)]
fn scenario_load_credentials(provider_context: ProviderContext) {
    drop(provider_context);
}

#[scenario(
    path = "tests/features/provider.feature",
    name = "Ignore unsupported providers"
)]
fn scenario_ignore_unsupported(provider_context: ProviderContext) {
    drop(provider_context);
}

#[scenario(
    path = "tests/features/provider.feature",
    name = "Report a missing provider file"
)]
fn scenario_missing_file(provider_context: ProviderContext) {
    drop(provider_context);
}

#[scenario(
    path = "tests/features/provider.feature",
    name = "Report malformed provider YAML"
)]
fn scenario_malformed_yaml(provider_context: ProviderContext) {
    drop(provider_context);
}
