//! Cloud backup scenarios. Each one runs once per configured provider.

use tonic::Code;
use tracing::info;

use super::credentials::{configured_credentials, create_credential};
use super::volume::{attach_volume, create_volume, inspect_volume};
use super::{
    CleanupAction, Group, Requirement, Scenario, ScenarioError, ScenarioFuture, Session, Teardown,
};
use crate::api::{
    SdkCloudBackupCatalogRequest, SdkCloudBackupCreateRequest, SdkCloudBackupDeleteAllRequest,
    SdkCloudBackupDeleteRequest, SdkCloudBackupEnumerateRequest, SdkCloudBackupHistoryRequest,
    SdkCloudBackupRestoreRequest, SdkClusterInspectCurrentRequest, SdkNodeInspectCurrentRequest,
};
use crate::capability::Capability;
use crate::expect::{RpcResultExt, ensure, ensure_not_empty, present};
use crate::fixtures::{test_volume_request, unique_name};

const CLOUD_BACKUP: &[Requirement] = &[
    Requirement::Capability(Capability::CloudBackup),
    Requirement::ProviderConfig,
];

/// Credential registered for one provider during a scenario.
pub(crate) struct RegisteredCredential {
    pub(crate) provider: &'static str,
    pub(crate) credential_id: String,
}

/// Registers every configured credential. Each one is scheduled for
/// deletion; when `volume_id` is given, deleting its backups under that
/// credential is scheduled to run first.
pub(crate) async fn register_credentials(
    session: &Session,
    teardown: &mut Teardown,
    volume_id: Option<&str>,
) -> Result<Vec<RegisteredCredential>, ScenarioError> {
    let mut registered = Vec::new();
    for credential in configured_credentials(session)? {
        let credential_id = create_credential(session, teardown, &credential).await?;
        if let Some(volume) = volume_id {
            teardown.push(CleanupAction::DeleteAllBackups {
                volume_id: volume.to_owned(),
                credential_id: credential_id.clone(),
            });
        }
        registered.push(RegisteredCredential {
            provider: credential.provider(),
            credential_id,
        });
    }
    Ok(registered)
}

/// Creates and attaches the standard volume, then registers credentials.
/// Teardown removes backups and credentials before detaching and deleting
/// the volume.
pub(crate) async fn attached_volume_with_credentials(
    session: &Session,
    teardown: &mut Teardown,
) -> Result<(String, Vec<RegisteredCredential>), ScenarioError> {
    let volume_id =
        create_volume(session, teardown, test_volume_request(&unique_name("backup-vol"))).await?;
    attach_volume(session, teardown, &volume_id).await?;
    let credentials = register_credentials(session, teardown, Some(&volume_id)).await?;
    Ok((volume_id, credentials))
}

/// Starts an incremental backup and waits for it to finish.
async fn back_up(
    session: &Session,
    volume_id: &str,
    credential: &RegisteredCredential,
) -> Result<(), ScenarioError> {
    let requested_task = unique_name("backup-task");
    info!(
        provider = credential.provider,
        volume_id,
        task_id = %requested_task,
        "starting cloud backup"
    );
    let response = session
        .cloud_backups()
        .create(SdkCloudBackupCreateRequest {
            volume_id: volume_id.to_owned(),
            credential_id: credential.credential_id.clone(),
            full: false,
            task_id: requested_task.clone(),
            ..SdkCloudBackupCreateRequest::default()
        })
        .await
        .rpc("CloudBackup.Create")?;
    let task_id = assigned_task(response.task_id, requested_task);
    let report = session.wait_for_backup(volume_id, &task_id).await?;
    info!(
        provider = credential.provider,
        volume_id,
        task_id = %task_id,
        polls = report.polls,
        elapsed_secs = report.elapsed.as_secs(),
        "cloud backup finished"
    );
    Ok(())
}

/// The task id the server reports, or the one requested when it echoes
/// nothing back.
fn assigned_task(returned: String, requested: String) -> String {
    if returned.is_empty() {
        requested
    } else {
        returned
    }
}

async fn cluster_id(session: &Session) -> Result<String, ScenarioError> {
    let response = session
        .cluster()
        .inspect_current(SdkClusterInspectCurrentRequest {})
        .await
        .rpc("Cluster.InspectCurrent")?;
    Ok(present("Cluster.InspectCurrent cluster", response.cluster)?.id)
}

/// Finds the id of the backup taken from `volume_id`.
async fn backup_id(
    session: &Session,
    cluster_id: &str,
    volume_id: &str,
    credential_id: &str,
) -> Result<String, ScenarioError> {
    let backups = session
        .cloud_backups()
        .enumerate(SdkCloudBackupEnumerateRequest {
            src_volume_id: volume_id.to_owned(),
            cluster_id: cluster_id.to_owned(),
            credential_id: credential_id.to_owned(),
            all: false,
        })
        .await
        .rpc("CloudBackup.Enumerate")?
        .backups;
    let found = backups
        .into_iter()
        .find(|backup| backup.src_volume_id == volume_id)
        .map(|backup| backup.id)
        .unwrap_or_default();
    ensure_not_empty("backup id for volume", &found)?;
    Ok(found)
}

fn create_completes<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let (volume_id, credentials) = attached_volume_with_credentials(session, teardown).await?;
        for credential in &credentials {
            back_up(session, &volume_id, credential).await?;
        }
        Ok(())
    })
}

async fn expect_create_rejected(
    session: &Session,
    volume_id: &str,
    credential_id: &str,
    expected: Code,
) -> Result<(), ScenarioError> {
    session
        .cloud_backups()
        .create(SdkCloudBackupCreateRequest {
            volume_id: volume_id.to_owned(),
            credential_id: credential_id.to_owned(),
            ..SdkCloudBackupCreateRequest::default()
        })
        .await
        .expect_code("CloudBackup.Create", expected)
}

fn create_missing_volume<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        for credential in register_credentials(session, teardown, None).await? {
            expect_create_rejected(
                session,
                "this-doesnt-exist",
                &credential.credential_id,
                Code::Internal,
            )
            .await?;
        }
        Ok(())
    })
}

fn create_empty_volume<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        for credential in register_credentials(session, teardown, None).await? {
            expect_create_rejected(session, "", &credential.credential_id, Code::InvalidArgument)
                .await?;
        }
        Ok(())
    })
}

fn create_missing_credential<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let volume_id =
            create_volume(session, teardown, test_volume_request(&unique_name("backup-vol")))
                .await?;
        expect_create_rejected(session, &volume_id, "cred-uuid-doesnt-exist", Code::Internal).await
    })
}

fn create_empty_credential<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let volume_id =
            create_volume(session, teardown, test_volume_request(&unique_name("backup-vol")))
                .await?;
        expect_create_rejected(session, &volume_id, "", Code::InvalidArgument).await
    })
}

fn enumerate_lists_backup<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let cluster = cluster_id(session).await?;
        let (volume_id, credentials) = attached_volume_with_credentials(session, teardown).await?;
        for credential in &credentials {
            back_up(session, &volume_id, credential).await?;
            let backups = session
                .cloud_backups()
                .enumerate(SdkCloudBackupEnumerateRequest {
                    src_volume_id: volume_id.clone(),
                    cluster_id: cluster.clone(),
                    credential_id: credential.credential_id.clone(),
                    all: true,
                })
                .await
                .rpc("CloudBackup.Enumerate")?
                .backups;
            ensure(!backups.is_empty(), || {
                format!("no backups listed for {} after a backup", credential.provider)
            })?;
        }
        Ok(())
    })
}

fn enumerate_missing_volume<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let cluster = cluster_id(session).await?;
        for credential in register_credentials(session, teardown, None).await? {
            let backups = session
                .cloud_backups()
                .enumerate(SdkCloudBackupEnumerateRequest {
                    src_volume_id: String::from("this-doesnt-exist"),
                    cluster_id: cluster.clone(),
                    credential_id: credential.credential_id.clone(),
                    all: false,
                })
                .await
                .rpc("CloudBackup.Enumerate")?
                .backups;
            ensure(backups.is_empty(), || {
                format!("{} backups listed for a missing volume", backups.len())
            })?;
        }
        Ok(())
    })
}

async fn expect_enumerate_rejected(
    session: &Session,
    teardown: &mut Teardown,
    credential_id: &str,
    expected: Code,
) -> Result<(), ScenarioError> {
    let cluster = cluster_id(session).await?;
    let volume_id =
        create_volume(session, teardown, test_volume_request(&unique_name("backup-vol"))).await?;
    session
        .cloud_backups()
        .enumerate(SdkCloudBackupEnumerateRequest {
            src_volume_id: volume_id,
            cluster_id: cluster,
            credential_id: credential_id.to_owned(),
            all: false,
        })
        .await
        .expect_code("CloudBackup.Enumerate", expected)
}

fn enumerate_dummy_credential<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        expect_enumerate_rejected(session, teardown, "dummy-credentials", Code::Internal).await
    })
}

fn enumerate_empty_credential<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        expect_enumerate_rejected(session, teardown, "", Code::InvalidArgument).await
    })
}

fn catalog_lists_contents<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let cluster = cluster_id(session).await?;
        let (volume_id, credentials) = attached_volume_with_credentials(session, teardown).await?;
        for credential in &credentials {
            back_up(session, &volume_id, credential).await?;
            let backup =
                backup_id(session, &cluster, &volume_id, &credential.credential_id).await?;
            let contents = session
                .cloud_backups()
                .catalog(SdkCloudBackupCatalogRequest {
                    backup_id: backup,
                    credential_id: credential.credential_id.clone(),
                })
                .await
                .rpc("CloudBackup.Catalog")?
                .contents;
            ensure(!contents.is_empty(), || {
                format!("empty catalog for the {} backup", credential.provider)
            })?;
        }
        Ok(())
    })
}

async fn expect_catalog_rejected(
    session: &Session,
    teardown: &mut Teardown,
    backup_id: &str,
    expected: Code,
) -> Result<(), ScenarioError> {
    for credential in register_credentials(session, teardown, None).await? {
        session
            .cloud_backups()
            .catalog(SdkCloudBackupCatalogRequest {
                backup_id: backup_id.to_owned(),
                credential_id: credential.credential_id,
            })
            .await
            .expect_code("CloudBackup.Catalog", expected)?;
    }
    Ok(())
}

fn catalog_dummy_backup<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        expect_catalog_rejected(session, teardown, "dummy-backupid", Code::Internal).await
    })
}

fn catalog_empty_backup<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        expect_catalog_rejected(session, teardown, "", Code::InvalidArgument).await
    })
}

fn history_lists_backup<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let (volume_id, credentials) = attached_volume_with_credentials(session, teardown).await?;
        for credential in &credentials {
            back_up(session, &volume_id, credential).await?;
        }
        let history = session
            .cloud_backups()
            .history(SdkCloudBackupHistoryRequest {
                src_volume_id: volume_id,
            })
            .await
            .rpc("CloudBackup.History")?
            .history_list;
        ensure(!history.is_empty(), || {
            String::from("backup history is empty after a backup")
        })
    })
}

fn history_empty_volume<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .cloud_backups()
            .history(SdkCloudBackupHistoryRequest {
                src_volume_id: String::new(),
            })
            .await
            .expect_code("CloudBackup.History", Code::InvalidArgument)
    })
}

fn history_missing_volume<'a>(session: &'a Session, _: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        session
            .cloud_backups()
            .history(SdkCloudBackupHistoryRequest {
                src_volume_id: String::from("this-doesnt-exist"),
            })
            .await
            .expect_code("CloudBackup.History", Code::Internal)
    })
}

fn restore_creates_volume<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let cluster = cluster_id(session).await?;
        let node = session
            .nodes()
            .inspect_current(SdkNodeInspectCurrentRequest {})
            .await
            .rpc("Node.InspectCurrent")?;
        let node_id = present("Node.InspectCurrent node", node.node)?.id;

        let (volume_id, credentials) = attached_volume_with_credentials(session, teardown).await?;
        for credential in &credentials {
            back_up(session, &volume_id, credential).await?;
            let backup =
                backup_id(session, &cluster, &volume_id, &credential.credential_id).await?;
            let restored = session
                .cloud_backups()
                .restore(SdkCloudBackupRestoreRequest {
                    backup_id: backup,
                    restore_volume_name: unique_name(&format!("restored-volume-{volume_id}")),
                    credential_id: credential.credential_id.clone(),
                    node_id: node_id.clone(),
                    ..SdkCloudBackupRestoreRequest::default()
                })
                .await
                .rpc("CloudBackup.Restore")?;
            ensure_not_empty("CloudBackup.Restore restore_volume_id", &restored.restore_volume_id)?;
            teardown.push(CleanupAction::delete_volume(&restored.restore_volume_id));
            inspect_volume(session, &restored.restore_volume_id).await?;
        }
        Ok(())
    })
}

fn delete_removes_backup<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let cluster = cluster_id(session).await?;
        let (volume_id, credentials) = attached_volume_with_credentials(session, teardown).await?;
        for credential in &credentials {
            back_up(session, &volume_id, credential).await?;
            let backup =
                backup_id(session, &cluster, &volume_id, &credential.credential_id).await?;
            session
                .cloud_backups()
                .delete(SdkCloudBackupDeleteRequest {
                    backup_id: backup,
                    credential_id: credential.credential_id.clone(),
                    force: false,
                })
                .await
                .rpc("CloudBackup.Delete")?;
        }
        Ok(())
    })
}

fn delete_empty_backup<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        for credential in register_credentials(session, teardown, None).await? {
            session
                .cloud_backups()
                .delete(SdkCloudBackupDeleteRequest {
                    backup_id: String::new(),
                    credential_id: credential.credential_id,
                    force: false,
                })
                .await
                .expect_code("CloudBackup.Delete", Code::InvalidArgument)?;
        }
        Ok(())
    })
}

fn delete_missing_backup<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        for credential in register_credentials(session, teardown, None).await? {
            session
                .cloud_backups()
                .delete(SdkCloudBackupDeleteRequest {
                    backup_id: String::from("doesnt-exist"),
                    credential_id: credential.credential_id,
                    force: false,
                })
                .await
                .expect_code("CloudBackup.Delete", Code::Internal)?;
        }
        Ok(())
    })
}

fn delete_all_succeeds<'a>(session: &'a Session, teardown: &'a mut Teardown) -> ScenarioFuture<'a> {
    Box::pin(async move {
        let (volume_id, credentials) = attached_volume_with_credentials(session, teardown).await?;
        for credential in &credentials {
            back_up(session, &volume_id, credential).await?;
            session
                .cloud_backups()
                .delete_all(SdkCloudBackupDeleteAllRequest {
                    src_volume_id: volume_id.clone(),
                    credential_id: credential.credential_id.clone(),
                })
                .await
                .rpc("CloudBackup.DeleteAll")?;
        }
        Ok(())
    })
}

fn delete_all_empty_volume<'a>(
    session: &'a Session,
    teardown: &'a mut Teardown,
) -> ScenarioFuture<'a> {
    Box::pin(async move {
        for credential in register_credentials(session, teardown, None).await? {
            session
                .cloud_backups()
                .delete_all(SdkCloudBackupDeleteAllRequest {
                    src_volume_id: String::new(),
                    credential_id: credential.credential_id,
                })
                .await
                .expect_code("CloudBackup.DeleteAll", Code::InvalidArgument)?;
        }
        Ok(())
    })
}

/// Cloud backup scenarios.
#[must_use]
pub fn scenarios() -> Vec<Scenario> {
    let group = Group::CloudBackup;
    let requires = CLOUD_BACKUP;
    vec![
        Scenario::new(group, "create completes", requires, create_completes),
        Scenario::new(group, "create fails for a missing volume", requires, create_missing_volume),
        Scenario::new(group, "create rejects an empty volume id", requires, create_empty_volume),
        Scenario::new(
            group,
            "create fails for a missing credential",
            requires,
            create_missing_credential,
        ),
        Scenario::new(
            group,
            "create rejects an empty credential id",
            requires,
            create_empty_credential,
        ),
        Scenario::new(group, "enumerate lists the backup", requires, enumerate_lists_backup),
        Scenario::new(
            group,
            "enumerate lists nothing for a missing volume",
            requires,
            enumerate_missing_volume,
        ),
        Scenario::new(
            group,
            "enumerate fails for a dummy credential",
            requires,
            enumerate_dummy_credential,
        ),
        Scenario::new(
            group,
            "enumerate rejects an empty credential id",
            requires,
            enumerate_empty_credential,
        ),
        Scenario::new(group, "catalog lists backup contents", requires, catalog_lists_contents),
        Scenario::new(group, "catalog fails for a dummy backup", requires, catalog_dummy_backup),
        Scenario::new(group, "catalog rejects an empty backup id", requires, catalog_empty_backup),
        Scenario::new(group, "history lists the backup", requires, history_lists_backup),
        Scenario::new(group, "history rejects an empty volume id", requires, history_empty_volume),
        Scenario::new(group, "history fails for a missing volume", requires, history_missing_volume)
            .known_issue("reference driver returns InvalidArgument instead of Internal"),
        Scenario::new(group, "restore creates a volume", requires, restore_creates_volume),
        Scenario::new(group, "delete removes the backup", requires, delete_removes_backup),
        Scenario::new(group, "delete rejects an empty backup id", requires, delete_empty_backup),
        Scenario::new(group, "delete fails for a missing backup", requires, delete_missing_backup)
            .known_issue("reference driver accepts deletion of missing backups"),
        Scenario::new(group, "delete all succeeds", requires, delete_all_succeeds),
        Scenario::new(
            group,
            "delete all rejects an empty volume id",
            requires,
            delete_all_empty_volume,
        ),
    ]
}
