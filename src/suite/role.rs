//! Role scenarios. These need token authentication.

use tonic::Code;

use super::{
    CleanupAction, Group, Requirement, Scenario, ScenarioError, ScenarioFuture, Session, Teardown,
};
use crate::api::{
    SdkRole, SdkRoleCreateRequest, SdkRoleDeleteRequest, SdkRoleEnumerateRequest,
    SdkRoleInspectRequest, SdkRule,
};
use crate::auth::TestUser;
use crate::expect::{RpcResultExt, ensure, ensure_eq, present};

const SHARED_SECRET: &[Requirement] = &[Requirement::SharedSecret];

const ROLE_NAME: &str = "tester";

async fn role_names(session: &Session) -> Result<Vec<String>, ScenarioError> {
    Ok(session
        .roles_as(TestUser::Admin)?
        .enumerate(SdkRoleEnumerateRequest {})
        .await
        .rpc("Role.Enumerate")?
        .names)
}

fn user_create_denied<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .roles_as(TestUser::User1)?
            .create(SdkRoleCreateRequest::default())
            .await
            .expect_code("Role.Create", Code::PermissionDenied)
    })
}

fn admin_lifecycle<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let mut admin = session.roles_as(TestUser::Admin)?;
        let created = admin
            .create(SdkRoleCreateRequest {
                role: Some(SdkRole {
                    name: String::from(ROLE_NAME),
                    rules: vec![SdkRule {
                        services: vec![String::from("identity")],
                        apis: vec![String::from("*")],
                    }],
                }),
            })
            .await
            .rpc("Role.Create")?;
        teardown.push(CleanupAction::DeleteRole {
            name: String::from(ROLE_NAME),
        });
        let created_role = present("Role.Create role", created.role)?;
        ensure_eq("created role", ROLE_NAME, created_role.name.as_str())?;

        let inspected = admin
            .inspect(SdkRoleInspectRequest {
                name: String::from(ROLE_NAME),
            })
            .await
            .rpc("Role.Inspect")?;
        ensure_eq(
            "inspected role",
            ROLE_NAME,
            present("Role.Inspect role", inspected.role)?.name.as_str(),
        )?;

        let before = role_names(session).await?;
        ensure(before.iter().any(|name| name == ROLE_NAME), || {
            format!("Role.Enumerate does not list {ROLE_NAME}")
        })?;

        admin
            .delete(SdkRoleDeleteRequest {
                name: String::from(ROLE_NAME),
            })
            .await
            .rpc("Role.Delete")?;
        teardown.dismiss(&CleanupAction::DeleteRole {
            name: String::from(ROLE_NAME),
        });

        let after = role_names(session).await?;
        ensure(after.iter().all(|name| name != ROLE_NAME), || {
            format!("Role.Enumerate still lists {ROLE_NAME} after deletion")
        })
    })
}

/// Role scenarios.
#[must_use]
pub fn scenarios() -> Vec<Scenario> {
    let group = Group::Role;
    vec![
        Scenario::new(group, "user cannot create roles", SHARED_SECRET, user_create_denied),
        Scenario::new(
            group,
            "admin creates, inspects, enumerates and deletes a role",
            SHARED_SECRET,
            admin_lifecycle,
        ),
    ]
}
