//! Scenario catalogue and the shared session every scenario runs against.
//!
//! Each submodule covers one SDK resource area and exposes a `scenarios()`
//! list. A scenario body receives the [`Session`] for client access and a
//! [`Teardown`] on which it registers every resource it creates.

pub mod cloud_backup;
pub mod cloud_backup_schedule;
pub mod cluster;
pub mod credentials;
pub mod identity;
pub mod node;
pub mod objectstore;
pub mod ownership;
pub mod role;
pub mod schedule_policy;
pub mod snapshot;
pub mod teardown;
pub mod volume;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use camino::Utf8Path;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::OnceCell;
use tonic::Code;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::Channel;

use crate::api::open_storage_cloud_backup_client::OpenStorageCloudBackupClient;
use crate::api::open_storage_cluster_client::OpenStorageClusterClient;
use crate::api::open_storage_credentials_client::OpenStorageCredentialsClient;
use crate::api::open_storage_identity_client::OpenStorageIdentityClient;
use crate::api::open_storage_node_client::OpenStorageNodeClient;
use crate::api::open_storage_objectstore_client::OpenStorageObjectstoreClient;
use crate::api::open_storage_role_client::OpenStorageRoleClient;
use crate::api::open_storage_schedule_policy_client::OpenStorageSchedulePolicyClient;
use crate::api::open_storage_volume_client::OpenStorageVolumeClient;
use crate::api::{
    SdkCloudBackupDeleteAllRequest, SdkCloudBackupSchedDeleteRequest, SdkCloudBackupStatus,
    SdkCloudBackupStatusRequest, SdkCloudBackupStatusType, SdkCredentialDeleteRequest,
    SdkIdentityCapabilitiesRequest, SdkObjectstoreDeleteRequest, SdkRoleDeleteRequest,
    SdkSchedulePolicyDeleteRequest, SdkVolumeDeleteRequest, SdkVolumeDetachRequest,
    SdkVolumeUnmountRequest,
};
use crate::auth::{AuthError, TestUser, TokenInterceptor};
use crate::capability::{self, Capability};
use crate::config::SanityConfig;
use crate::poll::{BackupPoller, BackupStatusSource, PollError, PollReport, StatusFuture};
use crate::provider::CloudProviderConfig;

pub use teardown::{CleanupAction, CleanupError, CleanupFuture, CleanupTarget, Teardown};

/// Channel type shared by every client; the interceptor adds credentials.
pub type AuthChannel = InterceptedService<Channel, TokenInterceptor>;
/// Volume and snapshot client.
pub type VolumeClient = OpenStorageVolumeClient<AuthChannel>;
/// Cloud backup client.
pub type CloudBackupClient = OpenStorageCloudBackupClient<AuthChannel>;
/// Credentials client.
pub type CredentialsClient = OpenStorageCredentialsClient<AuthChannel>;
/// Cluster client.
pub type ClusterClient = OpenStorageClusterClient<AuthChannel>;
/// Node client.
pub type NodeClient = OpenStorageNodeClient<AuthChannel>;
/// Schedule policy client.
pub type SchedulePolicyClient = OpenStorageSchedulePolicyClient<AuthChannel>;
/// Role client.
pub type RoleClient = OpenStorageRoleClient<AuthChannel>;
/// Identity client.
pub type IdentityClient = OpenStorageIdentityClient<AuthChannel>;
/// Object store client.
pub type ObjectstoreClient = OpenStorageObjectstoreClient<AuthChannel>;

/// Boxed future returned by a scenario body.
pub type ScenarioFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ScenarioError>> + Send + 'a>>;

/// Signature shared by all scenario bodies.
pub type ScenarioFn = for<'a> fn(&'a Session, &'a mut Teardown) -> ScenarioFuture<'a>;

/// SDK resource areas, used for grouping and `--focus`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Group {
    /// Identity service.
    Identity,
    /// Volume lifecycle.
    Volume,
    /// Volume snapshots.
    Snapshot,
    /// Schedule policies.
    SchedulePolicy,
    /// Object store credentials.
    Credentials,
    /// Cloud backups.
    CloudBackup,
    /// Cloud backup schedules.
    CloudBackupSchedule,
    /// Cluster inspection and alerts.
    Cluster,
    /// Nodes.
    Node,
    /// Roles.
    Role,
    /// Volume ownership.
    Ownership,
    /// Object stores.
    Objectstore,
}

impl Group {
    /// Every group in catalogue order.
    pub const ALL: [Self; 12] = [
        Self::Identity,
        Self::Volume,
        Self::Snapshot,
        Self::SchedulePolicy,
        Self::Credentials,
        Self::CloudBackup,
        Self::CloudBackupSchedule,
        Self::Cluster,
        Self::Node,
        Self::Role,
        Self::Ownership,
        Self::Objectstore,
    ];

    /// Name accepted by `--focus` and written to reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Volume => "volume",
            Self::Snapshot => "snapshot",
            Self::SchedulePolicy => "schedule-policy",
            Self::Credentials => "credentials",
            Self::CloudBackup => "cloud-backup",
            Self::CloudBackupSchedule => "cloud-backup-schedule",
            Self::Cluster => "cluster",
            Self::Node => "node",
            Self::Role => "role",
            Self::Ownership => "ownership",
            Self::Objectstore => "objectstore",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when `--focus` names an unknown group.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown scenario group {0:?}; expected one of: {names}", names = group_names())]
pub struct UnknownGroup(pub String);

fn group_names() -> String {
    Group::ALL
        .iter()
        .map(|group| group.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for Group {
    type Err = UnknownGroup;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|group| group.as_str() == wanted)
            .ok_or_else(|| UnknownGroup(value.to_owned()))
    }
}

/// Something a scenario needs before it can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement {
    /// The server must advertise this capability.
    Capability(Capability),
    /// A cloud provider YAML must be loaded.
    ProviderConfig,
    /// A local mount path must be configured.
    MountPath,
    /// A shared secret must be configured.
    SharedSecret,
}

/// One named check against the server.
#[derive(Clone, Copy)]
pub struct Scenario {
    /// Resource area.
    pub group: Group,
    /// Human-readable name, unique within the group.
    pub name: &'static str,
    /// Prerequisites checked before the body runs.
    pub requires: &'static [Requirement],
    /// Reason this scenario is expected to fail against the reference
    /// driver. Such scenarios are skipped unless explicitly requested.
    pub known_issue: Option<&'static str>,
    /// Scenario body.
    pub run: ScenarioFn,
}

impl Scenario {
    /// Registers a scenario.
    #[must_use]
    pub const fn new(
        group: Group,
        name: &'static str,
        requires: &'static [Requirement],
        run: ScenarioFn,
    ) -> Self {
        Self {
            group,
            name,
            requires,
            known_issue: None,
            run,
        }
    }

    /// Marks the scenario as a known issue of the reference driver.
    #[must_use]
    pub const fn known_issue(mut self, note: &'static str) -> Self {
        self.known_issue = Some(note);
        self
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("group", &self.group)
            .field("name", &self.name)
            .field("requires", &self.requires)
            .field("known_issue", &self.known_issue)
            .finish_non_exhaustive()
    }
}

/// Reasons a scenario body stops early.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScenarioError {
    /// The body decided at runtime that it cannot run, for example because
    /// the cluster has no alerts.
    #[error("skipped: {0}")]
    Skipped(String),
    /// A field-level check failed.
    #[error("assertion failed: {0}")]
    Assertion(String),
    /// An RPC expected to succeed failed.
    #[error("{call} failed with {code:?}: {message}")]
    Rpc {
        /// Service and method, for example `Volume.Create`.
        call: &'static str,
        /// Returned status code.
        code: Code,
        /// Returned status message.
        message: String,
    },
    /// An RPC failed with a different code than expected.
    #[error("{call} returned {actual:?} ({message}), expected {expected:?}")]
    UnexpectedCode {
        /// Service and method.
        call: &'static str,
        /// Code the scenario expected.
        expected: Code,
        /// Code the server returned.
        actual: Code,
        /// Returned status message.
        message: String,
    },
    /// An RPC expected to fail succeeded.
    #[error("{call} succeeded but was expected to fail")]
    UnexpectedSuccess {
        /// Service and method.
        call: &'static str,
    },
    /// Waiting for a cloud backup failed.
    #[error(transparent)]
    Poll(#[from] PollError),
    /// A user token could not be prepared.
    #[error("authentication setup failed: {0}")]
    Auth(String),
}

impl ScenarioError {
    /// Builds [`ScenarioError::Rpc`] from a status.
    #[must_use]
    pub fn rpc(call: &'static str, status: &tonic::Status) -> Self {
        Self::Rpc {
            call,
            code: status.code(),
            message: status.message().to_owned(),
        }
    }
}

impl From<AuthError> for ScenarioError {
    fn from(value: AuthError) -> Self {
        Self::Auth(value.to_string())
    }
}

/// State shared by every scenario in a run.
#[derive(Debug)]
pub struct Session {
    channel: Channel,
    config: SanityConfig,
    providers: Option<CloudProviderConfig>,
    default_auth: TokenInterceptor,
    capabilities: OnceCell<Vec<i32>>,
}

impl Session {
    /// Creates a session over an established channel. When a shared secret is
    /// configured, clients obtained without an explicit user present the
    /// admin token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the admin token cannot be minted.
    pub fn new(
        channel: Channel,
        config: SanityConfig,
        providers: Option<CloudProviderConfig>,
    ) -> Result<Self, AuthError> {
        let default_auth = match config.shared_secret.as_deref() {
            Some(secret) if !secret.is_empty() => {
                TokenInterceptor::for_user(TestUser::Admin, secret, &config.token_issuer)?
            }
            _ => TokenInterceptor::anonymous(),
        };
        Ok(Self {
            channel,
            config,
            providers,
            default_auth,
            capabilities: OnceCell::new(),
        })
    }

    /// Suite configuration.
    #[must_use]
    pub const fn config(&self) -> &SanityConfig {
        &self.config
    }

    /// Cloud provider configuration, when one was loaded.
    #[must_use]
    pub const fn providers(&self) -> Option<&CloudProviderConfig> {
        self.providers.as_ref()
    }

    /// Configured mount path, when one was given.
    #[must_use]
    pub fn mount_path(&self) -> Option<&Utf8Path> {
        self.config.mount_path.as_deref()
    }

    /// Whether a non-empty shared secret is configured.
    #[must_use]
    pub fn has_shared_secret(&self) -> bool {
        self.config
            .shared_secret
            .as_deref()
            .is_some_and(|secret| !secret.is_empty())
    }

    fn intercepted(&self) -> AuthChannel {
        InterceptedService::new(self.channel.clone(), self.default_auth.clone())
    }

    fn intercepted_as(&self, user: TestUser) -> Result<AuthChannel, ScenarioError> {
        let secret = self.config.shared_secret.as_deref().ok_or_else(|| {
            ScenarioError::Skipped(String::from("no shared secret configured"))
        })?;
        let interceptor = TokenInterceptor::for_user(user, secret, &self.config.token_issuer)?;
        Ok(InterceptedService::new(self.channel.clone(), interceptor))
    }

    /// Volume client using the default identity.
    #[must_use]
    pub fn volumes(&self) -> VolumeClient {
        OpenStorageVolumeClient::new(self.intercepted())
    }

    /// Volume client presenting `user`'s token.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError`] when no secret is configured or the token
    /// cannot be minted.
    pub fn volumes_as(&self, user: TestUser) -> Result<VolumeClient, ScenarioError> {
        Ok(OpenStorageVolumeClient::new(self.intercepted_as(user)?))
    }

    /// Cloud backup client.
    #[must_use]
    pub fn cloud_backups(&self) -> CloudBackupClient {
        OpenStorageCloudBackupClient::new(self.intercepted())
    }

    /// Credentials client.
    #[must_use]
    pub fn credentials(&self) -> CredentialsClient {
        OpenStorageCredentialsClient::new(self.intercepted())
    }

    /// Cluster client.
    #[must_use]
    pub fn cluster(&self) -> ClusterClient {
        OpenStorageClusterClient::new(self.intercepted())
    }

    /// Node client.
    #[must_use]
    pub fn nodes(&self) -> NodeClient {
        OpenStorageNodeClient::new(self.intercepted())
    }

    /// Schedule policy client.
    #[must_use]
    pub fn schedule_policies(&self) -> SchedulePolicyClient {
        OpenStorageSchedulePolicyClient::new(self.intercepted())
    }

    /// Role client using the default identity.
    #[must_use]
    pub fn roles(&self) -> RoleClient {
        OpenStorageRoleClient::new(self.intercepted())
    }

    /// Role client presenting `user`'s token.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError`] when no secret is configured or the token
    /// cannot be minted.
    pub fn roles_as(&self, user: TestUser) -> Result<RoleClient, ScenarioError> {
        Ok(OpenStorageRoleClient::new(self.intercepted_as(user)?))
    }

    /// Identity client.
    #[must_use]
    pub fn identity(&self) -> IdentityClient {
        OpenStorageIdentityClient::new(self.intercepted())
    }

    /// Object store client.
    #[must_use]
    pub fn objectstores(&self) -> ObjectstoreClient {
        OpenStorageObjectstoreClient::new(self.intercepted())
    }

    /// Raw capability types advertised by the server, queried once per run.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Rpc`] when the capabilities query fails.
    pub async fn capabilities(&self) -> Result<&[i32], ScenarioError> {
        let advertised = self
            .capabilities
            .get_or_try_init(|| async {
                let response = self
                    .identity()
                    .capabilities(SdkIdentityCapabilitiesRequest {})
                    .await
                    .map_err(|status| {
                        ScenarioError::rpc("Identity.Capabilities", &status)
                    })?;
                Ok::<_, ScenarioError>(capability::advertised(response.get_ref()))
            })
            .await?;
        Ok(advertised.as_slice())
    }

    /// Pre-populates the capability cache, skipping the identity query.
    /// Returns `false` when the cache was already filled.
    #[must_use]
    pub fn seed_capabilities(&self, capabilities: &[Capability]) -> bool {
        let raw = capabilities
            .iter()
            .map(|capability| capability.service_type() as i32)
            .collect();
        self.capabilities.set(raw).is_ok()
    }

    /// Whether the server advertises `capability`.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Rpc`] when the capabilities query fails.
    pub async fn supports(&self, capability: Capability) -> Result<bool, ScenarioError> {
        Ok(capability::supported(self.capabilities().await?, capability))
    }

    /// Waits for the cloud backup task `task_id` on `volume_id` using the
    /// configured policy.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Poll`] when the backup fails or times out.
    pub async fn wait_for_backup(
        &self,
        volume_id: &str,
        task_id: &str,
    ) -> Result<PollReport, ScenarioError> {
        let source = TaskStatusSource {
            session: self,
            task_id,
        };
        let report = BackupPoller::new(&source, self.config.poll_policy())
            .wait(volume_id)
            .await?;
        Ok(report)
    }

    async fn perform_cleanup(&self, action: &CleanupAction) -> Result<(), tonic::Status> {
        match action {
            CleanupAction::DeleteVolume { volume_id, user } => {
                let request = SdkVolumeDeleteRequest {
                    volume_id: volume_id.clone(),
                };
                match user {
                    Some(owner) => {
                        let channel = self
                            .intercepted_as(*owner)
                            .map_err(|err| tonic::Status::unauthenticated(err.to_string()))?;
                        OpenStorageVolumeClient::new(channel).delete(request).await?;
                    }
                    None => {
                        self.volumes().delete(request).await?;
                    }
                }
            }
            CleanupAction::DetachVolume { volume_id } => {
                self.volumes()
                    .detach(SdkVolumeDetachRequest {
                        volume_id: volume_id.clone(),
                    })
                    .await?;
            }
            CleanupAction::Unmount {
                volume_id,
                mount_path,
            } => {
                self.volumes()
                    .unmount(SdkVolumeUnmountRequest {
                        volume_id: volume_id.clone(),
                        mount_path: mount_path.to_string(),
                        ..SdkVolumeUnmountRequest::default()
                    })
                    .await?;
            }
            CleanupAction::DeleteCredential { credential_id } => {
                self.credentials()
                    .delete(SdkCredentialDeleteRequest {
                        credential_id: credential_id.clone(),
                    })
                    .await?;
            }
            CleanupAction::DeleteAllBackups {
                volume_id,
                credential_id,
            } => {
                self.cloud_backups()
                    .delete_all(SdkCloudBackupDeleteAllRequest {
                        src_volume_id: volume_id.clone(),
                        credential_id: credential_id.clone(),
                    })
                    .await?;
            }
            CleanupAction::DeleteSchedulePolicy { name } => {
                self.schedule_policies()
                    .delete(SdkSchedulePolicyDeleteRequest { name: name.clone() })
                    .await?;
            }
            CleanupAction::DeleteRole { name } => {
                self.roles()
                    .delete(SdkRoleDeleteRequest { name: name.clone() })
                    .await?;
            }
            CleanupAction::DeleteBackupSchedule { schedule_id } => {
                self.cloud_backups()
                    .sched_delete(SdkCloudBackupSchedDeleteRequest {
                        backup_schedule_id: schedule_id.clone(),
                    })
                    .await?;
            }
            CleanupAction::DeleteObjectstore { objectstore_id } => {
                self.objectstores()
                    .delete(SdkObjectstoreDeleteRequest {
                        objectstore_id: objectstore_id.clone(),
                    })
                    .await?;
            }
        }
        Ok(())
    }
}

impl CleanupTarget for Session {
    fn cleanup<'a>(&'a self, action: &'a CleanupAction) -> CleanupFuture<'a> {
        Box::pin(async move {
            self.perform_cleanup(action)
                .await
                .map_err(|status| CleanupError {
                    action: action.clone(),
                    message: format!("{:?}: {}", status.code(), status.message()),
                })
        })
    }
}

/// Status source bound to one backup task, so a later backup of the same
/// volume never reads an earlier task's terminal state.
struct TaskStatusSource<'s> {
    session: &'s Session,
    task_id: &'s str,
}

impl BackupStatusSource for TaskStatusSource<'_> {
    fn status<'a>(&'a self, volume_id: &'a str) -> StatusFuture<'a> {
        Box::pin(async move {
            let response = self
                .session
                .cloud_backups()
                .status(SdkCloudBackupStatusRequest {
                    volume_id: volume_id.to_owned(),
                    task_id: self.task_id.to_owned(),
                    ..SdkCloudBackupStatusRequest::default()
                })
                .await
                .map_err(|status| PollError::Rpc {
                    volume_id: volume_id.to_owned(),
                    message: format!("{:?}: {}", status.code(), status.message()),
                })?
                .into_inner();
            Ok(task_status(&response.statuses, self.task_id, volume_id))
        })
    }
}

/// Picks the status of `task_id`. Servers that key statuses by volume are
/// read through `volume_id` only when the task key is absent; the request
/// already filters by task.
fn task_status(
    statuses: &HashMap<String, SdkCloudBackupStatus>,
    task_id: &str,
    volume_id: &str,
) -> Option<SdkCloudBackupStatusType> {
    statuses
        .get(task_id)
        .or_else(|| statuses.get(volume_id))
        .and_then(|status| SdkCloudBackupStatusType::try_from(status.status).ok())
}

/// Every scenario in catalogue order.
#[must_use]
pub fn catalogue() -> Vec<Scenario> {
    [
        identity::scenarios(),
        volume::scenarios(),
        snapshot::scenarios(),
        schedule_policy::scenarios(),
        credentials::scenarios(),
        cloud_backup::scenarios(),
        cloud_backup_schedule::scenarios(),
        cluster::scenarios(),
        node::scenarios(),
        role::scenarios(),
        ownership::scenarios(),
        objectstore::scenarios(),
    ]
    .concat()
}
