//! Credential scenarios, plus the credential helpers the backup groups reuse.

use tonic::Code;

use super::{
    CleanupAction, Group, Requirement, Scenario, ScenarioError, ScenarioFuture, Session, Teardown,
};
use crate::api::{
    SdkCredentialDeleteRequest, SdkCredentialEnumerateRequest, SdkCredentialInspectRequest,
    SdkCredentialValidateRequest, sdk_credential_create_request::CredentialType as CreateType,
    sdk_credential_inspect_response::CredentialType,
};
use crate::capability::Capability;
use crate::expect::{RpcResultExt, ensure_eq, ensure_not_empty};
use crate::fixtures::{test_credential_request, unique_name};
use crate::provider::ProviderCredential;

const CREDENTIALS: &[Requirement] = &[
    Requirement::Capability(Capability::Credentials),
    Requirement::ProviderConfig,
];
const CREDENTIALS_ONLY: &[Requirement] = &[Requirement::Capability(Capability::Credentials)];

/// Every credential in the loaded provider file.
///
/// # Errors
///
/// Returns [`ScenarioError::Skipped`] when no provider file was loaded or it
/// names no supported provider.
pub(crate) fn configured_credentials(
    session: &Session,
) -> Result<Vec<ProviderCredential>, ScenarioError> {
    let credentials = session
        .providers()
        .map(|providers| providers.credentials())
        .unwrap_or_default();
    if credentials.is_empty() {
        return Err(ScenarioError::Skipped(String::from(
            "provider config names no supported cloud provider",
        )));
    }
    Ok(credentials)
}

/// Registers `credential` with the server and schedules its deletion.
pub(crate) async fn create_credential(
    session: &Session,
    teardown: &mut Teardown,
    credential: &ProviderCredential,
) -> Result<String, ScenarioError> {
    let response = session
        .credentials()
        .create(credential.to_request())
        .await
        .rpc("Credentials.Create")?;
    ensure_not_empty("Credentials.Create credential_id", &response.credential_id)?;
    teardown.push(CleanupAction::DeleteCredential {
        credential_id: response.credential_id.clone(),
    });
    Ok(response.credential_id)
}

async fn credential_count(session: &Session) -> Result<usize, ScenarioError> {
    Ok(session
        .credentials()
        .enumerate(SdkCredentialEnumerateRequest {})
        .await
        .rpc("Credentials.Enumerate")?
        .credential_ids
        .len())
}

fn create_grows_count<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let credentials = configured_credentials(session)?;
        let before = credential_count(session).await?;
        for credential in &credentials {
            create_credential(session, teardown, credential).await?;
        }
        ensure_eq(
            "credential count",
            &(before + credentials.len()),
            &credential_count(session).await?,
        )
    })
}

fn aws_lifecycle<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let credential = session
            .providers()
            .and_then(|providers| providers.credential("aws"))
            .ok_or_else(|| {
                ScenarioError::Skipped(String::from("provider config has no aws entry"))
            })?;
        let ProviderCredential::Aws {
            access_key, region, ..
        } = &credential
        else {
            return Err(ScenarioError::Skipped(String::from(
                "aws entry did not parse as an aws credential",
            )));
        };

        let credential_id = create_credential(session, teardown, &credential).await?;
        session
            .credentials()
            .validate(SdkCredentialValidateRequest {
                credential_id: credential_id.clone(),
            })
            .await
            .rpc("Credentials.Validate")?;

        let inspected = session
            .credentials()
            .inspect(SdkCredentialInspectRequest {
                credential_id: credential_id.clone(),
            })
            .await
            .rpc("Credentials.Inspect")?;
        let Some(CredentialType::AwsCredential(aws)) = inspected.credential_type else {
            return Err(ScenarioError::Assertion(String::from(
                "Credentials.Inspect did not return an aws credential",
            )));
        };
        ensure_eq("access key", access_key, &aws.access_key)?;
        ensure_eq("region", region, &aws.region)?;

        session
            .credentials()
            .delete(SdkCredentialDeleteRequest {
                credential_id: credential_id.clone(),
            })
            .await
            .rpc("Credentials.Delete")?;
        teardown.dismiss(&CleanupAction::DeleteCredential { credential_id });
        Ok(())
    })
}

fn static_aws_round_trips<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let name = unique_name("test-credential");
        let request = test_credential_request(&name);
        let Some(CreateType::AwsCredential(requested)) = request.credential_type.clone() else {
            return Err(ScenarioError::Assertion(String::from(
                "static credential request is not an aws credential",
            )));
        };
        let response = session
            .credentials()
            .create(request)
            .await
            .rpc("Credentials.Create")?;
        ensure_not_empty("Credentials.Create credential_id", &response.credential_id)?;
        teardown.push(CleanupAction::DeleteCredential {
            credential_id: response.credential_id.clone(),
        });

        let inspected = session
            .credentials()
            .inspect(SdkCredentialInspectRequest {
                credential_id: response.credential_id,
            })
            .await
            .rpc("Credentials.Inspect")?;
        ensure_eq("credential name", &name, &inspected.name)?;
        let Some(CredentialType::AwsCredential(aws)) = inspected.credential_type else {
            return Err(ScenarioError::Assertion(String::from(
                "Credentials.Inspect did not return an aws credential",
            )));
        };
        ensure_eq("access key", &requested.access_key, &aws.access_key)?;
        ensure_eq("endpoint", &requested.endpoint, &aws.endpoint)?;
        ensure_eq("region", &requested.region, &aws.region)
    })
}

fn delete_empty_id<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .credentials()
            .delete(SdkCredentialDeleteRequest {
                credential_id: String::new(),
            })
            .await
            .expect_code("Credentials.Delete", Code::InvalidArgument)
    })
}

/// Credential scenarios.
#[must_use]
pub fn scenarios() -> Vec<Scenario> {
    let group = Group::Credentials;
    vec![
        Scenario::new(group, "create grows the credential count", CREDENTIALS, create_grows_count),
        Scenario::new(
            group,
            "aws create, validate, inspect and delete",
            CREDENTIALS,
            aws_lifecycle,
        ),
        Scenario::new(
            group,
            "static aws credential round-trips",
            CREDENTIALS_ONLY,
            static_aws_round_trips,
        ),
        Scenario::new(group, "delete rejects an empty id", CREDENTIALS, delete_empty_id),
    ]
}
