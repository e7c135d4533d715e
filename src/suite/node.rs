//! Node scenarios.

use tonic::Code;

use super::{Group, Requirement, Scenario, ScenarioError, ScenarioFuture, Session, Teardown};
use crate::api::{SdkNodeEnumerateRequest, SdkNodeInspectCurrentRequest, SdkNodeInspectRequest};
use crate::capability::Capability;
use crate::expect::{RpcResultExt, ensure, ensure_eq, present};

const NODE: &[Requirement] = &[Requirement::Capability(Capability::Node)];

async fn node_ids(session: &Session) -> Result<Vec<String>, ScenarioError> {
    let ids = session
        .nodes()
        .enumerate(SdkNodeEnumerateRequest {})
        .await
        .rpc("Node.Enumerate")?
        .node_ids;
    ensure(!ids.is_empty(), || String::from("Node.Enumerate listed no nodes"))?;
    Ok(ids)
}

fn enumerate_lists_nodes<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move { node_ids(session).await.map(drop) })
}

fn inspect_each_node<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        for node_id in node_ids(session).await? {
            let response = session
                .nodes()
                .inspect(SdkNodeInspectRequest {
                    node_id: node_id.clone(),
                })
                .await
                .rpc("Node.Inspect")?;
            let node = present("Node.Inspect node", response.node)?;
            ensure_eq("inspected node id", &node_id, &node.id)?;
        }
        Ok(())
    })
}

fn inspect_empty_id<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .nodes()
            .inspect(SdkNodeInspectRequest {
                node_id: String::new(),
            })
            .await
            .expect_code("Node.Inspect", Code::InvalidArgument)
    })
}

fn inspect_current_is_enumerated<'a>(
    session: &'a Session,
    _: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let ids = node_ids(session).await?;
        let response = session
            .nodes()
            .inspect_current(SdkNodeInspectCurrentRequest {})
            .await
            .rpc("Node.InspectCurrent")?;
        let node = present("Node.InspectCurrent node", response.node)?;
        ensure(ids.contains(&node.id), || {
            format!("current node {} is not enumerated", node.id)
        })
    })
}

/// Node scenarios.
#[must_use]
pub fn scenarios() -> Vec<Scenario> {
    let group = Group::Node;
    vec![
        Scenario::new(group, "enumerate lists nodes", NODE, enumerate_lists_nodes),
        Scenario::new(group, "inspect every enumerated node", NODE, inspect_each_node),
        Scenario::new(group, "inspect rejects an empty id", NODE, inspect_empty_id),
        Scenario::new(
            group,
            "inspect current returns an enumerated node",
            NODE,
            inspect_current_is_enumerated,
        ),
    ]
}
