//! Identity scenarios. These run against every server.

use super::{Group, Scenario, ScenarioFuture, Session, Teardown};
use crate::api::{SdkIdentityCapabilitiesRequest, SdkIdentityVersionRequest};
use crate::capability::{Capability, raw_service_type};
use crate::expect::{RpcResultExt, ensure, ensure_not_empty, present};

fn capabilities_are_known<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let response = session
            .identity()
            .capabilities(SdkIdentityCapabilitiesRequest {})
            .await
            .rpc("Identity.Capabilities")?;
        for entry in &response.capabilities {
            let raw = raw_service_type(entry).unwrap_or_default();
            ensure(Capability::from_raw(raw).is_some(), || {
                format!("unknown capability type {raw}")
            })?;
        }
        Ok(())
    })
}

fn version_is_reported<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let response = session
            .identity()
            .version(SdkIdentityVersionRequest {})
            .await
            .rpc("Identity.Version")?;
        let sdk = present("Identity.Version sdk_version", response.sdk_version)?;
        ensure_not_empty("sdk version string", &sdk.version)?;
        let storage = present("Identity.Version version", response.version)?;
        ensure_not_empty("storage driver name", &storage.driver)?;
        ensure_not_empty("storage driver version", &storage.version)
    })
}

/// Identity scenarios.
#[must_use]
pub fn scenarios() -> Vec<Scenario> {
    let group = Group::Identity;
    vec![
        Scenario::new(group, "capabilities are all known types", &[], capabilities_are_known),
        Scenario::new(group, "version is reported", &[], version_is_reported),
    ]
}
