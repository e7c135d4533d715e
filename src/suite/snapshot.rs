//! Snapshot scenarios.

use std::collections::HashMap;

use super::volume::{create_volume, inspect_volume};
use super::{
    CleanupAction, Group, Requirement, Scenario, ScenarioError, ScenarioFuture, Session, Teardown,
};
use crate::api::{
    FsType, SdkSchedulePolicyCreateRequest, SdkTimeWeekday, SdkVolumeSnapshotCreateRequest,
    SdkVolumeSnapshotEnumerateRequest, SdkVolumeSnapshotRestoreRequest, SdkVolumeUpdateRequest,
    VolumeSpecUpdate, volume_spec_update::SnapshotScheduleOpt,
};
use crate::capability::Capability;
use crate::expect::{RpcResultExt, ensure_eq, ensure_not_empty};
use crate::fixtures::{
    GIB, compare_volume_details, schedule_policy, sized_volume_request, snapshot_name,
    test_volume_request, unique_name, weekly_interval,
};

const VOLUME: &[Requirement] = &[Requirement::Capability(Capability::Volume)];
const VOLUME_AND_POLICY: &[Requirement] = &[
    Requirement::Capability(Capability::Volume),
    Requirement::Capability(Capability::SchedulePolicy),
];

/// Creates the standard volume and checks it round-trips.
async fn source_volume(
    session: &Session,
    teardown: &mut Teardown,
) -> Result<String, ScenarioError> {
    let request = test_volume_request(&unique_name("sdk-vol"));
    let volume_id = create_volume(session, teardown, request.clone()).await?;
    compare_volume_details(&request, &inspect_volume(session, &volume_id).await?)?;
    Ok(volume_id)
}

/// Snapshots `volume_id`, registers the snapshot for deletion and checks
/// that it names the volume as its parent.
async fn snapshot(
    session: &Session,
    teardown: &mut Teardown,
    volume_id: &str,
    label: &str,
) -> Result<String, ScenarioError> {
    let response = session
        .volumes()
        .snapshot_create(SdkVolumeSnapshotCreateRequest {
            volume_id: volume_id.to_owned(),
            name: snapshot_name(volume_id),
            labels: HashMap::from([(String::from("Name"), label.to_owned())]),
        })
        .await
        .rpc("Volume.SnapshotCreate")?;
    ensure_not_empty("Volume.SnapshotCreate snapshot_id", &response.snapshot_id)?;
    teardown.push(CleanupAction::delete_volume(&response.snapshot_id));

    let inspected = inspect_volume(session, &response.snapshot_id).await?;
    let parent = inspected
        .source
        .as_ref()
        .map_or("", |source| source.parent.as_str());
    ensure_eq("snapshot parent", volume_id, parent)?;
    Ok(response.snapshot_id)
}

fn create_sets_parent<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let volume_id = source_volume(session, teardown).await?;
        snapshot(session, teardown, &volume_id, &format!("snapshot-of{volume_id}"))
            .await
            .map(drop)
    })
}

fn enumerate_lists_snapshots<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        const SNAPSHOTS: usize = 3;
        let volume_id = source_volume(session, teardown).await?;
        for index in 0..SNAPSHOTS {
            let label = format!("snapshot-{index}-of{volume_id}");
            snapshot(session, teardown, &volume_id, &label).await?;
        }

        let listed = session
            .volumes()
            .snapshot_enumerate(SdkVolumeSnapshotEnumerateRequest {
                volume_id: volume_id.clone(),
            })
            .await
            .rpc("Volume.SnapshotEnumerate")?
            .volume_snapshot_ids;
        ensure_eq("snapshot count", &SNAPSHOTS, &listed.len())
    })
}

fn restore_succeeds<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let volume_id = source_volume(session, teardown).await?;
        let snapshot_id =
            snapshot(session, teardown, &volume_id, &format!("snapshot-of{volume_id}")).await?;
        session
            .volumes()
            .snapshot_restore(SdkVolumeSnapshotRestoreRequest {
                volume_id,
                snapshot_id,
            })
            .await
            .rpc("Volume.SnapshotRestore")
            .map(drop)
    })
}

fn schedule_lands_in_spec<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let mut request = sized_volume_request(&unique_name("sdk-vol"), 5 * GIB, 3);
        if let Some(spec) = request.spec.as_mut() {
            spec.format = FsType::Ext4.into();
        }
        let volume_id = create_volume(session, teardown, request).await?;

        let policy_name = unique_name("mypolicy");
        session
            .schedule_policies()
            .create(SdkSchedulePolicyCreateRequest {
                schedule_policy: Some(schedule_policy(
                    &policy_name,
                    vec![weekly_interval(SdkTimeWeekday::Sunday, 0, 30, 2)],
                )),
            })
            .await
            .rpc("SchedulePolicy.Create")?;
        teardown.push(CleanupAction::DeleteSchedulePolicy {
            name: policy_name.clone(),
        });

        let schedule = format!("policy={policy_name}");
        session
            .volumes()
            .update(SdkVolumeUpdateRequest {
                volume_id: volume_id.clone(),
                spec: Some(VolumeSpecUpdate {
                    snapshot_schedule_opt: Some(SnapshotScheduleOpt::SnapshotSchedule(
                        schedule.clone(),
                    )),
                    ..VolumeSpecUpdate::default()
                }),
                ..SdkVolumeUpdateRequest::default()
            })
            .await
            .rpc("Volume.Update")?;

        let volume = inspect_volume(session, &volume_id).await?;
        let applied = volume
            .spec
            .as_ref()
            .map_or("", |spec| spec.snapshot_schedule.as_str());
        ensure_eq("volume snapshot_schedule", schedule.as_str(), applied)
    })
}

/// Snapshot scenarios.
#[must_use]
pub fn scenarios() -> Vec<Scenario> {
    let group = Group::Snapshot;
    vec![
        Scenario::new(group, "create records the parent volume", VOLUME, create_sets_parent),
        Scenario::new(group, "enumerate lists every snapshot", VOLUME, enumerate_lists_snapshots),
        Scenario::new(group, "restore from a snapshot", VOLUME, restore_succeeds),
        Scenario::new(
            group,
            "schedule policy lands in the volume spec",
            VOLUME_AND_POLICY,
            schedule_lands_in_spec,
        )
        .known_issue("reference driver does not apply schedule policies to volumes"),
    ]
}
