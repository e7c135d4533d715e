//! Volume ownership scenarios. Each one starts from a volume owned by user1.

use tonic::Code;

use super::{
    CleanupAction, Group, Requirement, Scenario, ScenarioError, ScenarioFuture, Session, Teardown,
};
use crate::api::{
    FsType, Ownership, SdkVolumeEnumerateRequest, SdkVolumeInspectRequest, SdkVolumeUpdateRequest,
    VolumeSpecUpdate, ownership::AccessControl,
};
use crate::auth::TestUser;
use crate::expect::{RpcResultExt, ensure, ensure_eq, ensure_not_empty, present};
use crate::fixtures::{GIB, sized_volume_request, unique_name};

const SHARED_SECRET: &[Requirement] = &[Requirement::SharedSecret];

/// Users that list an owned volume whatever its ACLs grant.
const ALWAYS_VISIBLE: [TestUser; 2] = [TestUser::User1, TestUser::Admin];

async fn user1_volume(session: &Session, teardown: &mut Teardown) -> Result<String, ScenarioError> {
    let mut request = sized_volume_request(&unique_name("sdk-vol"), GIB, 1);
    if let Some(spec) = request.spec.as_mut() {
        spec.format = FsType::Ext4.into();
    }
    let response = session
        .volumes_as(TestUser::User1)?
        .create(request)
        .await
        .rpc("Volume.Create")?;
    ensure_not_empty("Volume.Create volume_id", &response.volume_id)?;
    teardown.push(CleanupAction::DeleteVolume {
        volume_id: response.volume_id.clone(),
        user: Some(TestUser::User1),
    });
    Ok(response.volume_id)
}

async fn ownership_seen_by_owner(
    session: &Session,
    volume_id: &str,
) -> Result<Ownership, ScenarioError> {
    let response = session
        .volumes_as(TestUser::User1)?
        .inspect(SdkVolumeInspectRequest {
            volume_id: volume_id.to_owned(),
        })
        .await
        .rpc("Volume.Inspect")?;
    let volume = present("Volume.Inspect volume", response.volume)?;
    let spec = present("volume spec", volume.spec)?;
    let ownership = present("volume ownership", spec.ownership)?;
    ensure_eq("owner", TestUser::User1.name(), ownership.owner.as_str())?;
    Ok(ownership)
}

async fn visible_to(
    session: &Session,
    user: TestUser,
    volume_id: &str,
) -> Result<bool, ScenarioError> {
    let ids = session
        .volumes_as(user)?
        .enumerate(SdkVolumeEnumerateRequest {})
        .await
        .rpc("Volume.Enumerate")?
        .volume_ids;
    Ok(ids.iter().any(|id| id == volume_id))
}

/// Checks the owner and admin list `volume_id` and user2 lists it exactly
/// when `user2_sees` holds.
async fn check_visibility(
    session: &Session,
    volume_id: &str,
    user2_sees: bool,
    stage: &str,
) -> Result<(), ScenarioError> {
    for user in ALWAYS_VISIBLE {
        ensure(visible_to(session, user, volume_id).await?, || {
            format!("{} cannot see user1's volume {stage}", user.name())
        })?;
    }
    let seen = visible_to(session, TestUser::User2, volume_id).await?;
    ensure(seen == user2_sees, || {
        format!("user2 visibility of user1's volume {stage}: expected {user2_sees}, got {seen}")
    })
}

fn acl_update(volume_id: &str, groups: &[&str]) -> SdkVolumeUpdateRequest {
    SdkVolumeUpdateRequest {
        volume_id: volume_id.to_owned(),
        spec: Some(VolumeSpecUpdate {
            ownership: Some(Ownership {
                acls: Some(AccessControl {
                    groups: groups.iter().map(|group| (*group).to_owned()).collect(),
                    ..AccessControl::default()
                }),
                ..Ownership::default()
            }),
            ..VolumeSpecUpdate::default()
        }),
        ..SdkVolumeUpdateRequest::default()
    }
}

fn granted_groups(ownership: &Ownership) -> &[String] {
    ownership
        .acls
        .as_ref()
        .map_or(&[], |acls| acls.groups.as_slice())
}

fn owner_is_recorded<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let volume_id = user1_volume(session, teardown).await?;
        ownership_seen_by_owner(session, &volume_id).await.map(drop)
    })
}

fn group_grant_controls_visibility<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let volume_id = user1_volume(session, teardown).await?;
        check_visibility(session, &volume_id, false, "before the group grant").await?;

        session
            .volumes_as(TestUser::User1)?
            .update(acl_update(&volume_id, &["users"]))
            .await
            .rpc("Volume.Update")?;
        let ownership = ownership_seen_by_owner(session, &volume_id).await?;
        ensure_eq("acl groups", &["users"][..], granted_groups(&ownership))?;

        check_visibility(session, &volume_id, true, "after the group grant").await
    })
}

fn non_owner_cannot_update<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let volume_id = user1_volume(session, teardown).await?;
        session
            .volumes_as(TestUser::User1)?
            .update(acl_update(&volume_id, &["users"]))
            .await
            .rpc("Volume.Update")?;
        session
            .volumes_as(TestUser::User2)?
            .update(acl_update(&volume_id, &["users", "anothergroup"]))
            .await
            .expect_code("Volume.Update", Code::PermissionDenied)
    })
}

fn admin_extends_groups<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let volume_id = user1_volume(session, teardown).await?;
        session
            .volumes_as(TestUser::Admin)?
            .update(acl_update(&volume_id, &["users", "others"]))
            .await
            .rpc("Volume.Update")?;

        let ownership = ownership_seen_by_owner(session, &volume_id).await?;
        let groups = granted_groups(&ownership);
        ensure_eq("acl group count", &2_usize, &groups.len())?;
        for wanted in ["users", "others"] {
            ensure(groups.iter().any(|group| group == wanted), || {
                format!("acl groups {groups:?} lack {wanted}")
            })?;
        }
        Ok(())
    })
}

/// Ownership scenarios.
#[must_use]
pub fn scenarios() -> Vec<Scenario> {
    let group = Group::Ownership;
    vec![
        Scenario::new(group, "creator is recorded as owner", SHARED_SECRET, owner_is_recorded),
        Scenario::new(
            group,
            "group grant controls visibility",
            SHARED_SECRET,
            group_grant_controls_visibility,
        ),
        Scenario::new(
            group,
            "non-owner cannot update acls",
            SHARED_SECRET,
            non_owner_cannot_update,
        ),
        Scenario::new(group, "admin can extend acl groups", SHARED_SECRET, admin_extends_groups),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_and_admin_always_list_the_volume() {
        assert!(ALWAYS_VISIBLE.contains(&TestUser::User1));
        assert!(ALWAYS_VISIBLE.contains(&TestUser::Admin));
        assert!(!ALWAYS_VISIBLE.contains(&TestUser::User2));
    }

    #[test]
    fn acl_update_carries_only_the_groups() {
        let request = acl_update("vol-1", &["users", "others"]);

        let ownership = request
            .spec
            .and_then(|spec| spec.ownership)
            .expect("ownership update");
        assert_eq!(granted_groups(&ownership), ["users", "others"]);
        assert!(ownership.owner.is_empty());
    }
}
