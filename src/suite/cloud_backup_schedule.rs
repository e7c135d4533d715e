//! Cloud backup schedule scenarios.

use tonic::Code;

use super::cloud_backup::register_credentials;
use super::volume::{attach_volume, create_volume};
use super::{
    CleanupAction, Group, Requirement, Scenario, ScenarioError, ScenarioFuture, Session, Teardown,
};
use crate::api::{
    SdkCloudBackupSchedCreateRequest, SdkCloudBackupSchedDeleteRequest,
    SdkCloudBackupSchedEnumerateRequest, SdkCloudBackupScheduleInfo,
};
use crate::capability::Capability;
use crate::expect::{RpcResultExt, ensure, ensure_not_empty};
use crate::fixtures::{daily_interval, test_volume_request, unique_name};

const CLOUD_BACKUP: &[Requirement] = &[
    Requirement::Capability(Capability::CloudBackup),
    Requirement::ProviderConfig,
];

const MAX_BACKUPS: u64 = 3;

/// Daily 00:`minute` schedule keeping one backup, capped at three backups.
fn schedule_info(volume_id: &str, credential_id: &str, minute: i32) -> SdkCloudBackupScheduleInfo {
    SdkCloudBackupScheduleInfo {
        src_volume_id: volume_id.to_owned(),
        credential_id: credential_id.to_owned(),
        schedules: vec![daily_interval(0, minute, 1)],
        max_backups: MAX_BACKUPS,
        full: false,
    }
}

async fn attached_volume(
    session: &Session,
    teardown: &mut Teardown,
) -> Result<String, ScenarioError> {
    let volume_id =
        create_volume(session, teardown, test_volume_request(&unique_name("sched-vol"))).await?;
    attach_volume(session, teardown, &volume_id).await?;
    Ok(volume_id)
}

/// Creates a schedule and registers its deletion.
async fn create_schedule(
    session: &Session,
    teardown: &mut Teardown,
    info: SdkCloudBackupScheduleInfo,
) -> Result<String, ScenarioError> {
    let response = session
        .cloud_backups()
        .sched_create(SdkCloudBackupSchedCreateRequest {
            cloud_sched_info: Some(info),
        })
        .await
        .rpc("CloudBackup.SchedCreate")?;
    ensure_not_empty("CloudBackup.SchedCreate backup_schedule_id", &response.backup_schedule_id)?;
    teardown.push(CleanupAction::DeleteBackupSchedule {
        schedule_id: response.backup_schedule_id.clone(),
    });
    Ok(response.backup_schedule_id)
}

async fn delete_schedule(
    session: &Session,
    teardown: &mut Teardown,
    schedule_id: String,
) -> Result<(), ScenarioError> {
    session
        .cloud_backups()
        .sched_delete(SdkCloudBackupSchedDeleteRequest {
            backup_schedule_id: schedule_id.clone(),
        })
        .await
        .rpc("CloudBackup.SchedDelete")?;
    teardown.dismiss(&CleanupAction::DeleteBackupSchedule { schedule_id });
    Ok(())
}

async fn expect_create_rejected(
    session: &Session,
    teardown: &mut Teardown,
    volume_id: &str,
    minute: i32,
    expected: Code,
) -> Result<(), ScenarioError> {
    for credential in register_credentials(session, teardown, None).await? {
        session
            .cloud_backups()
            .sched_create(SdkCloudBackupSchedCreateRequest {
                cloud_sched_info: Some(schedule_info(volume_id, &credential.credential_id, minute)),
            })
            .await
            .expect_code("CloudBackup.SchedCreate", expected)?;
    }
    Ok(())
}

fn create_then_delete<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let volume_id = attached_volume(session, teardown).await?;
        for credential in register_credentials(session, teardown, None).await? {
            let info = schedule_info(&volume_id, &credential.credential_id, 30);
            let schedule_id = create_schedule(session, teardown, info).await?;
            delete_schedule(session, teardown, schedule_id).await?;
        }
        Ok(())
    })
}

fn create_missing_volume<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        expect_create_rejected(session, teardown, "volid-doesnt-exist", 30, Code::Internal).await
    })
}

fn create_negative_minute<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        expect_create_rejected(
            session,
            teardown,
            "volid-doesnt-exist",
            -30,
            Code::InvalidArgument,
        )
        .await
    })
}

fn create_empty_volume<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        expect_create_rejected(session, teardown, "", 30, Code::InvalidArgument).await
    })
}

fn enumerate_lists_schedule<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let volume_id = attached_volume(session, teardown).await?;
        let mut created = Vec::new();
        for credential in register_credentials(session, teardown, None).await? {
            let info = schedule_info(&volume_id, &credential.credential_id, 30);
            created.push(create_schedule(session, teardown, info).await?);
        }
        let listed = session
            .cloud_backups()
            .sched_enumerate(SdkCloudBackupSchedEnumerateRequest {})
            .await
            .rpc("CloudBackup.SchedEnumerate")?
            .cloud_sched_list;
        ensure(!listed.is_empty(), || {
            String::from("no backup schedules listed after creation")
        })?;
        for schedule_id in &created {
            ensure(listed.contains_key(schedule_id), || {
                format!("schedule {schedule_id} missing from the enumeration")
            })?;
        }
        Ok(())
    })
}

fn delete_removes_schedule<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let volume_id = attached_volume(session, teardown).await?;
        for credential in register_credentials(session, teardown, None).await? {
            let info = schedule_info(&volume_id, &credential.credential_id, 30);
            let schedule_id = create_schedule(session, teardown, info).await?;
            delete_schedule(session, teardown, schedule_id.clone()).await?;

            let listed = session
                .cloud_backups()
                .sched_enumerate(SdkCloudBackupSchedEnumerateRequest {})
                .await
                .rpc("CloudBackup.SchedEnumerate")?
                .cloud_sched_list;
            ensure(!listed.contains_key(&schedule_id), || {
                format!("schedule {schedule_id} still listed after deletion")
            })?;
        }
        Ok(())
    })
}

/// Cloud backup schedule scenarios.
#[must_use]
pub fn scenarios() -> Vec<Scenario> {
    let group = Group::CloudBackupSchedule;
    let requires = CLOUD_BACKUP;
    vec![
        Scenario::new(group, "create returns an id", requires, create_then_delete),
        Scenario::new(group, "create fails for a missing volume", requires, create_missing_volume),
        Scenario::new(group, "create rejects a negative minute", requires, create_negative_minute),
        Scenario::new(group, "create rejects an empty volume id", requires, create_empty_volume),
        Scenario::new(group, "enumerate lists the schedule", requires, enumerate_lists_schedule),
        Scenario::new(group, "delete removes the schedule", requires, delete_removes_schedule),
    ]
}
