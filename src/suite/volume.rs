//! Volume lifecycle scenarios, plus the volume helpers other groups reuse.

use std::collections::HashMap;

use tonic::Code;

use super::{
    CleanupAction, Group, Requirement, Scenario, ScenarioError, ScenarioFuture, Session, Teardown,
};
use crate::api::{
    SdkVolumeAttachRequest, SdkVolumeCloneRequest, SdkVolumeCreateRequest, SdkVolumeDeleteRequest,
    SdkVolumeDetachRequest, SdkVolumeEnumerateRequest, SdkVolumeEnumerateWithFiltersRequest,
    SdkVolumeInspectRequest, SdkVolumeMountRequest, SdkVolumeStatsRequest,
    SdkVolumeUnmountRequest, Volume, VolumeSpec,
};
use crate::capability::Capability;
use crate::expect::{RpcResultExt, ensure, ensure_eq, ensure_not_empty, present};
use crate::fixtures::{
    GIB, compare_volume_details, sized_volume_request, test_volume_request, unique_name,
};

const VOLUME: &[Requirement] = &[Requirement::Capability(Capability::Volume)];
const VOLUME_AND_MOUNT: &[Requirement] = &[
    Requirement::Capability(Capability::Volume),
    Requirement::MountPath,
];

/// Creates a volume and registers its deletion.
pub(crate) async fn create_volume(
    session: &Session,
    teardown: &mut Teardown,
    request: SdkVolumeCreateRequest,
) -> Result<String, ScenarioError> {
    let response = session.volumes().create(request).await.rpc("Volume.Create")?;
    ensure_not_empty("Volume.Create volume_id", &response.volume_id)?;
    teardown.push(CleanupAction::delete_volume(&response.volume_id));
    Ok(response.volume_id)
}

/// Attaches a volume, registers its detach and returns the device path.
pub(crate) async fn attach_volume(
    session: &Session,
    teardown: &mut Teardown,
    volume_id: &str,
) -> Result<String, ScenarioError> {
    let response = session
        .volumes()
        .attach(SdkVolumeAttachRequest {
            volume_id: volume_id.to_owned(),
            ..SdkVolumeAttachRequest::default()
        })
        .await
        .rpc("Volume.Attach")?;
    teardown.push(CleanupAction::DetachVolume {
        volume_id: volume_id.to_owned(),
    });
    Ok(response.device_path)
}

/// Inspects a volume and returns its description.
pub(crate) async fn inspect_volume(
    session: &Session,
    volume_id: &str,
) -> Result<Volume, ScenarioError> {
    let response = session
        .volumes()
        .inspect(SdkVolumeInspectRequest {
            volume_id: volume_id.to_owned(),
        })
        .await
        .rpc("Volume.Inspect")?;
    present("Volume.Inspect volume", response.volume)
}

async fn volume_ids(session: &Session) -> Result<Vec<String>, ScenarioError> {
    Ok(session
        .volumes()
        .enumerate(SdkVolumeEnumerateRequest {})
        .await
        .rpc("Volume.Enumerate")?
        .volume_ids)
}

fn create_round_trips<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let request = test_volume_request(&unique_name("sdk-vol"));
        let volume_id = create_volume(session, teardown, request.clone()).await?;
        let volume = inspect_volume(session, &volume_id).await?;
        compare_volume_details(&request, &volume)
    })
}

fn create_without_name<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .volumes()
            .create(sized_volume_request("", 5 * GIB, 0))
            .await
            .expect_code("Volume.Create", Code::InvalidArgument)
    })
}

fn create_zero_size<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .volumes()
            .create(sized_volume_request(&unique_name("zero-size-vol"), 0, 0))
            .await
            .expect_code("Volume.Create", Code::Internal)
    })
}

fn create_duplicate_name<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let request = sized_volume_request(&unique_name("already-exists-vol"), 5 * GIB, 0);
        create_volume(session, teardown, request.clone()).await?;
        let duplicate = session.volumes().create(request).await;
        if let Ok(response) = &duplicate {
            teardown.push(CleanupAction::delete_volume(&response.get_ref().volume_id));
        }
        duplicate.expect_code("Volume.Create", Code::AlreadyExists)
    })
}

fn inspect_round_trips<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let request = sized_volume_request(&unique_name("inspect-vol"), 5 * GIB, 2);
        let volume_id = create_volume(session, teardown, request.clone()).await?;
        let volume = inspect_volume(session, &volume_id).await?;
        ensure_eq("Volume.Inspect id", volume_id.as_str(), volume.id.as_str())?;
        compare_volume_details(&request, &volume)
    })
}

fn inspect_missing<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .volumes()
            .inspect(SdkVolumeInspectRequest {
                volume_id: String::from("junk-id-doesnt-exist"),
            })
            .await
            .expect_code("Volume.Inspect", Code::Internal)
    })
}

fn delete_succeeds<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let request = sized_volume_request(&unique_name("delete-vol"), 5 * GIB, 3);
        let volume_id = create_volume(session, teardown, request).await?;
        session
            .volumes()
            .delete(SdkVolumeDeleteRequest {
                volume_id: volume_id.clone(),
            })
            .await
            .rpc("Volume.Delete")?;
        teardown.dismiss(&CleanupAction::delete_volume(volume_id));
        Ok(())
    })
}

fn delete_empty_id<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .volumes()
            .delete(SdkVolumeDeleteRequest {
                volume_id: String::new(),
            })
            .await
            .expect_code("Volume.Delete", Code::InvalidArgument)
    })
}

fn delete_missing<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .volumes()
            .delete(SdkVolumeDeleteRequest {
                volume_id: String::from("dummy-id"),
            })
            .await
            .expect_code("Volume.Delete", Code::InvalidArgument)
    })
}

fn enumerate_tracks_count<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let before = volume_ids(session).await?.len();
        let request = sized_volume_request(&unique_name("enumerate-vol"), 5 * GIB, 1);
        let volume_id = create_volume(session, teardown, request).await?;

        let during = volume_ids(session).await?;
        ensure_eq("volume count after create", &(before + 1), &during.len())?;
        ensure(during.contains(&volume_id), || {
            format!("Volume.Enumerate does not list new volume {volume_id}")
        })?;

        session
            .volumes()
            .delete(SdkVolumeDeleteRequest {
                volume_id: volume_id.clone(),
            })
            .await
            .rpc("Volume.Delete")?;
        teardown.dismiss(&CleanupAction::delete_volume(volume_id));

        let after = volume_ids(session).await?.len();
        ensure_eq("volume count after delete", &before, &after)
    })
}

fn enumerate_by_label<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        const PER_LABEL: usize = 5;
        let marker = unique_name("enumerate");
        let mut expected = Vec::with_capacity(PER_LABEL);
        for index in 0..PER_LABEL {
            let request = volume_with_label(&format!("{marker}-same-{index}"), &marker);
            expected.push(create_volume(session, teardown, request).await?);
        }
        for index in 0..PER_LABEL {
            let request = volume_with_label(
                &format!("{marker}-other-{index}"),
                &format!("{marker}-{index}"),
            );
            create_volume(session, teardown, request).await?;
        }

        let mut listed = session
            .volumes()
            .enumerate_with_filters(SdkVolumeEnumerateWithFiltersRequest {
                labels: HashMap::from([(String::from("test"), marker.clone())]),
                ..SdkVolumeEnumerateWithFiltersRequest::default()
            })
            .await
            .rpc("Volume.EnumerateWithFilters")?
            .volume_ids;
        listed.sort();
        expected.sort();
        ensure_eq("volumes matching label", &expected, &listed)
    })
}

fn volume_with_label(name: &str, label: &str) -> SdkVolumeCreateRequest {
    SdkVolumeCreateRequest {
        name: name.to_owned(),
        spec: Some(VolumeSpec {
            size: 5 * GIB,
            volume_labels: HashMap::from([(String::from("test"), label.to_owned())]),
            ..VolumeSpec::default()
        }),
        labels: HashMap::from([(String::from("test"), label.to_owned())]),
    }
}

fn enumerate_empty_request<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let volume_id =
            create_volume(session, teardown, test_volume_request(&unique_name("enum-vol"))).await?;
        let listed = session
            .volumes()
            .enumerate(SdkVolumeEnumerateRequest {})
            .await
            .rpc("Volume.Enumerate")?
            .volume_ids;
        ensure(listed.iter().all(|id| !id.is_empty()), || {
            format!("Volume.Enumerate listed an empty id: {listed:?}")
        })?;
        ensure(listed.contains(&volume_id), || {
            format!("Volume.Enumerate did not list {volume_id}: {listed:?}")
        })
    })
}

fn attach_returns_device<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let request = sized_volume_request(&unique_name("attach-vol"), 5 * GIB, 1);
        let volume_id = create_volume(session, teardown, request).await?;
        let device_path = attach_volume(session, teardown, &volume_id).await?;
        ensure_not_empty("Volume.Attach device_path", &device_path)
    })
}

fn attach_empty_id<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .volumes()
            .attach(SdkVolumeAttachRequest::default())
            .await
            .expect_code("Volume.Attach", Code::InvalidArgument)
    })
}

fn attach_missing<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .volumes()
            .attach(SdkVolumeAttachRequest {
                volume_id: String::from("attach-doesnt-exist"),
                ..SdkVolumeAttachRequest::default()
            })
            .await
            .expect_code("Volume.Attach", Code::Internal)
    })
}

fn detach_succeeds<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let request = sized_volume_request(&unique_name("detach-vol"), 5 * GIB, 3);
        let volume_id = create_volume(session, teardown, request).await?;
        let device_path = attach_volume(session, teardown, &volume_id).await?;
        ensure_not_empty("Volume.Attach device_path", &device_path)?;

        session
            .volumes()
            .detach(SdkVolumeDetachRequest {
                volume_id: volume_id.clone(),
            })
            .await
            .rpc("Volume.Detach")?;
        teardown.dismiss(&CleanupAction::DetachVolume { volume_id });
        Ok(())
    })
}

fn detach_empty_id<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .volumes()
            .detach(SdkVolumeDetachRequest {
                volume_id: String::new(),
            })
            .await
            .expect_code("Volume.Detach", Code::InvalidArgument)
    })
}

fn detach_not_attached<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let request = sized_volume_request(&unique_name("detach-vol-non-attached"), 5 * GIB, 0);
        let volume_id = create_volume(session, teardown, request).await?;
        session
            .volumes()
            .detach(SdkVolumeDetachRequest { volume_id })
            .await
            .expect_code("Volume.Detach", Code::Internal)
    })
}

fn detach_missing<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .volumes()
            .detach(SdkVolumeDetachRequest {
                volume_id: String::from("dummy-doesnt-exist"),
            })
            .await
            .expect_code("Volume.Detach", Code::Internal)
    })
}

fn configured_mount_path(session: &Session) -> Result<String, ScenarioError> {
    session
        .mount_path()
        .map(ToString::to_string)
        .ok_or_else(|| ScenarioError::Skipped(String::from("no mount path configured")))
}

fn mount_succeeds<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let mount_path = configured_mount_path(session)?;
        let volume_id =
            create_volume(session, teardown, test_volume_request(&unique_name("mount-vol")))
                .await?;
        let device_path = attach_volume(session, teardown, &volume_id).await?;
        ensure_not_empty("Volume.Attach device_path", &device_path)?;

        session
            .volumes()
            .mount(SdkVolumeMountRequest {
                volume_id: volume_id.clone(),
                mount_path: mount_path.clone(),
                ..SdkVolumeMountRequest::default()
            })
            .await
            .rpc("Volume.Mount")?;
        teardown.push(CleanupAction::Unmount {
            volume_id,
            mount_path: mount_path.into(),
        });
        Ok(())
    })
}

fn mount_empty_id<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let mount_path = configured_mount_path(session)?;
        session
            .volumes()
            .mount(SdkVolumeMountRequest {
                mount_path,
                ..SdkVolumeMountRequest::default()
            })
            .await
            .expect_code("Volume.Mount", Code::InvalidArgument)
    })
}

fn mount_not_attached<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let mount_path = configured_mount_path(session)?;
        let request = sized_volume_request(&unique_name("mount-vol-non-attached"), 5 * GIB, 0);
        let volume_id = create_volume(session, teardown, request).await?;
        session
            .volumes()
            .mount(SdkVolumeMountRequest {
                volume_id,
                mount_path,
                ..SdkVolumeMountRequest::default()
            })
            .await
            .expect_code("Volume.Mount", Code::Internal)
    })
}

fn mount_missing<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let mount_path = configured_mount_path(session)?;
        session
            .volumes()
            .mount(SdkVolumeMountRequest {
                volume_id: String::from("dummy-doesnt-exist"),
                mount_path,
                ..SdkVolumeMountRequest::default()
            })
            .await
            .expect_code("Volume.Mount", Code::Internal)
    })
}

fn unmount_empty_id<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let mount_path = configured_mount_path(session)?;
        session
            .volumes()
            .unmount(SdkVolumeUnmountRequest {
                mount_path,
                ..SdkVolumeUnmountRequest::default()
            })
            .await
            .expect_code("Volume.Unmount", Code::InvalidArgument)
    })
}

fn clone_succeeds<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let request = sized_volume_request(&unique_name("volume-to-be-cloned"), 5 * GIB, 2);
        let parent_id = create_volume(session, teardown, request).await?;
        let response = super::VolumeClient::clone(
            &mut session.volumes(),
            SdkVolumeCloneRequest {
                name: unique_name("cloned-vol"),
                parent_id,
            },
        )
        .await
            .rpc("Volume.Clone")?;
        ensure_not_empty("Volume.Clone volume_id", &response.volume_id)?;
        teardown.push(CleanupAction::delete_volume(response.volume_id));
        Ok(())
    })
}

fn clone_keeps_parent_size<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let request = sized_volume_request(&unique_name("volume-to-be-cloned"), 5 * GIB, 0);
        let parent_id = create_volume(session, teardown, request).await?;

        // Clone requests carry no spec, so the clone must inherit its size.
        let cloned = super::VolumeClient::clone(
            &mut session.volumes(),
            SdkVolumeCloneRequest {
                name: unique_name("cloned-vol"),
                parent_id: parent_id.clone(),
            },
        )
        .await
            .rpc("Volume.Clone")?;
        teardown.push(CleanupAction::delete_volume(&cloned.volume_id));

        let parent = inspect_volume(session, &parent_id).await?;
        let clone = inspect_volume(session, &cloned.volume_id).await?;
        let size = |volume: &Volume| volume.spec.as_ref().map_or(0, |spec| spec.size);
        ensure_eq("clone size", &size(&parent), &size(&clone))?;
        let parent_of_clone = clone
            .source
            .as_ref()
            .map_or("", |source| source.parent.as_str());
        ensure_eq("clone parent", parent_id.as_str(), parent_of_clone)
    })
}

fn stats<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
    not_cumulative: bool,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let volume_id =
            create_volume(session, teardown, test_volume_request(&unique_name("stats-vol")))
                .await?;
        let response = session
            .volumes()
            .stats(SdkVolumeStatsRequest {
                volume_id,
                not_cumulative,
            })
            .await
            .rpc("Volume.Stats")?;
        present("Volume.Stats stats", response.stats).map(drop)
    })
}

fn stats_not_cumulative<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    stats(session, teardown, true)
}

fn stats_cumulative<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    stats(session, teardown, false)
}

fn stats_missing<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .volumes()
            .stats(SdkVolumeStatsRequest {
                volume_id: String::from("volID-doesnt-exist"),
                not_cumulative: true,
            })
            .await
            .expect_failure("Volume.Stats")
            .map(drop)
    })
}

fn stats_empty_id<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .volumes()
            .stats(SdkVolumeStatsRequest {
                volume_id: String::new(),
                not_cumulative: true,
            })
            .await
            .expect_code("Volume.Stats", Code::InvalidArgument)
    })
}

/// Volume scenarios.
#[must_use]
pub fn scenarios() -> Vec<Scenario> {
    let group = Group::Volume;
    vec![
        Scenario::new(group, "create round-trips spec fields", VOLUME, create_round_trips),
        Scenario::new(group, "create rejects an empty name", VOLUME, create_without_name),
        Scenario::new(group, "create rejects size zero", VOLUME, create_zero_size),
        Scenario::new(group, "create rejects a duplicate name", VOLUME, create_duplicate_name)
            .known_issue("reference driver replaces a volume whose name already exists"),
        Scenario::new(group, "inspect round-trips spec fields", VOLUME, inspect_round_trips),
        Scenario::new(group, "inspect fails for a missing volume", VOLUME, inspect_missing)
            .known_issue("reference driver does not report missing volumes on inspect"),
        Scenario::new(group, "delete succeeds", VOLUME, delete_succeeds),
        Scenario::new(group, "delete rejects an empty id", VOLUME, delete_empty_id),
        Scenario::new(group, "delete fails for a missing volume", VOLUME, delete_missing)
            .known_issue("reference driver accepts deletion of missing volumes"),
        Scenario::new(
            group,
            "enumerate count follows create and delete",
            VOLUME,
            enumerate_tracks_count,
        ),
        Scenario::new(group, "enumerate filters by label", VOLUME, enumerate_by_label)
            .known_issue("reference driver ignores label filters"),
        Scenario::new(
            group,
            "enumerate with an empty request lists every volume",
            VOLUME,
            enumerate_empty_request,
        ),
        Scenario::new(group, "attach returns a device path", VOLUME, attach_returns_device),
        Scenario::new(group, "attach rejects an empty id", VOLUME, attach_empty_id),
        Scenario::new(group, "attach fails for a missing volume", VOLUME, attach_missing)
            .known_issue("reference driver attaches volumes that do not exist"),
        Scenario::new(group, "detach succeeds", VOLUME, detach_succeeds),
        Scenario::new(group, "detach rejects an empty id", VOLUME, detach_empty_id),
        Scenario::new(group, "detach fails for a non-attached volume", VOLUME, detach_not_attached)
            .known_issue("reference driver detaches volumes that are not attached"),
        Scenario::new(group, "detach fails for a missing volume", VOLUME, detach_missing)
            .known_issue("reference driver detaches volumes that do not exist"),
        Scenario::new(group, "mount succeeds", VOLUME_AND_MOUNT, mount_succeeds),
        Scenario::new(group, "mount rejects an empty id", VOLUME_AND_MOUNT, mount_empty_id),
        Scenario::new(
            group,
            "mount fails for a non-attached volume",
            VOLUME_AND_MOUNT,
            mount_not_attached,
        )
        .known_issue("reference driver mounts volumes that are not attached"),
        Scenario::new(group, "mount fails for a missing volume", VOLUME_AND_MOUNT, mount_missing)
            .known_issue("reference driver returns the wrong code for missing volumes"),
        Scenario::new(group, "unmount rejects an empty id", VOLUME_AND_MOUNT, unmount_empty_id),
        Scenario::new(group, "clone returns a volume id", VOLUME, clone_succeeds),
        Scenario::new(group, "clone keeps the parent size", VOLUME, clone_keeps_parent_size)
            .known_issue("reference driver does not validate clone sizes against the parent"),
        Scenario::new(group, "stats, not cumulative", VOLUME, stats_not_cumulative),
        Scenario::new(group, "stats, cumulative", VOLUME, stats_cumulative),
        Scenario::new(group, "stats fails for a missing volume", VOLUME, stats_missing)
            .known_issue("PWX-6056"),
        Scenario::new(group, "stats rejects an empty id", VOLUME, stats_empty_id),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_enumerate_request_runs_by_default() {
        let scenario = scenarios()
            .into_iter()
            .find(|scenario| scenario.name.starts_with("enumerate with an empty request"))
            .expect("scenario registered");

        assert!(scenario.known_issue.is_none());
        assert!(scenario.requires.iter().all(|req| *req != Requirement::MountPath));
    }
}
