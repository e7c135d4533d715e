//! Cluster and alert scenarios.

use std::time::{Duration, SystemTime};

use super::{Group, Requirement, Scenario, ScenarioError, ScenarioFuture, Session, Teardown};
use crate::api::{
    Alert, ResourceType, SdkClusterAlertClearRequest, SdkClusterAlertDeleteRequest,
    SdkClusterAlertEnumerateRequest, SdkClusterInspectCurrentRequest,
};
use crate::capability::Capability;
use crate::expect::{RpcResultExt, ensure, ensure_not_empty, present};

const CLUSTER: &[Requirement] = &[Requirement::Capability(Capability::Cluster)];

const ALERT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

const ALERT_RESOURCES: [ResourceType; 4] = [
    ResourceType::Volume,
    ResourceType::Node,
    ResourceType::Cluster,
    ResourceType::Drive,
];

/// Alerts raised against `resource` during the last day.
async fn alerts(session: &Session, resource: ResourceType) -> Result<Vec<Alert>, ScenarioError> {
    let end = SystemTime::now();
    let start = end.checked_sub(ALERT_WINDOW).unwrap_or(SystemTime::UNIX_EPOCH);
    Ok(session
        .cluster()
        .alert_enumerate(SdkClusterAlertEnumerateRequest {
            time_start: Some(start.into()),
            time_end: Some(end.into()),
            resource: resource.into(),
        })
        .await
        .rpc("Cluster.AlertEnumerate")?
        .alerts)
}

/// First alert found across every resource type.
async fn first_alert(session: &Session) -> Result<(ResourceType, Alert), ScenarioError> {
    for resource in ALERT_RESOURCES {
        if let Some(alert) = alerts(session, resource).await?.into_iter().next() {
            return Ok((resource, alert));
        }
    }
    Err(ScenarioError::Skipped(String::from(
        "cluster has no alerts from the last day",
    )))
}

fn inspect_current<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let response = session
            .cluster()
            .inspect_current(SdkClusterInspectCurrentRequest {})
            .await
            .rpc("Cluster.InspectCurrent")?;
        let cluster = present("Cluster.InspectCurrent cluster", response.cluster)?;
        ensure_not_empty("cluster id", &cluster.id)
    })
}

fn alert_enumerate<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        for resource in ALERT_RESOURCES {
            alerts(session, resource).await?;
        }
        Ok(())
    })
}

fn alert_clear<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let (resource, alert) = first_alert(session).await?;
        session
            .cluster()
            .alert_clear(SdkClusterAlertClearRequest {
                resource: resource.into(),
                alert_id: alert.id,
            })
            .await
            .rpc("Cluster.AlertClear")?;

        let cleared = alerts(session, resource)
            .await?
            .into_iter()
            .find(|listed| listed.id == alert.id)
            .is_none_or(|listed| listed.cleared);
        ensure(cleared, || format!("alert {} is not cleared", alert.id))
    })
}

fn alert_delete<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let (resource, alert) = first_alert(session).await?;
        session
            .cluster()
            .alert_delete(SdkClusterAlertDeleteRequest {
                resource: resource.into(),
                alert_id: alert.id,
            })
            .await
            .rpc("Cluster.AlertDelete")?;

        let remaining = alerts(session, resource).await?;
        ensure(remaining.iter().all(|listed| listed.id != alert.id), || {
            format!("alert {} still listed after deletion", alert.id)
        })
    })
}

/// Cluster scenarios.
#[must_use]
pub fn scenarios() -> Vec<Scenario> {
    let group = Group::Cluster;
    vec![
        Scenario::new(group, "inspect current returns an id", CLUSTER, inspect_current),
        Scenario::new(group, "alert enumerate per resource", CLUSTER, alert_enumerate),
        Scenario::new(group, "alert clear marks the alert", CLUSTER, alert_clear),
        Scenario::new(group, "alert delete removes the alert", CLUSTER, alert_delete),
    ]
}
