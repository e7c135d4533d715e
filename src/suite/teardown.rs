//! Per-scenario cleanup stack.
//!
//! Scenarios push a [`CleanupAction`] as soon as a resource exists on the
//! server. The runner drains the stack in reverse order once the body has
//! finished, whatever its outcome, so resources are released in the opposite
//! order to their creation (unmount before detach before delete).

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::auth::TestUser;

/// A server-side resource to release after a scenario.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CleanupAction {
    /// Delete a volume, optionally presenting a specific user's token.
    DeleteVolume {
        /// Volume to delete.
        volume_id: String,
        /// Identity that owns the volume; `None` uses the session default.
        user: Option<TestUser>,
    },
    /// Detach an attached volume.
    DetachVolume {
        /// Volume to detach.
        volume_id: String,
    },
    /// Unmount a mounted volume.
    Unmount {
        /// Volume to unmount.
        volume_id: String,
        /// Path it was mounted on.
        mount_path: Utf8PathBuf,
    },
    /// Delete a stored credential.
    DeleteCredential {
        /// Credential to delete.
        credential_id: String,
    },
    /// Delete every cloud backup of a volume held under a credential.
    DeleteAllBackups {
        /// Source volume of the backups.
        volume_id: String,
        /// Credential the backups were written with.
        credential_id: String,
    },
    /// Delete a schedule policy.
    DeleteSchedulePolicy {
        /// Policy name.
        name: String,
    },
    /// Delete a role.
    DeleteRole {
        /// Role name.
        name: String,
    },
    /// Delete a cloud backup schedule.
    DeleteBackupSchedule {
        /// Schedule identifier.
        schedule_id: String,
    },
    /// Delete an object store.
    DeleteObjectstore {
        /// Object store identifier.
        objectstore_id: String,
    },
}

impl CleanupAction {
    /// Volume deletion with the session's default identity.
    #[must_use]
    pub fn delete_volume(volume_id: impl Into<String>) -> Self {
        Self::DeleteVolume {
            volume_id: volume_id.into(),
            user: None,
        }
    }
}

impl fmt::Display for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeleteVolume { volume_id, .. } => write!(f, "delete volume {volume_id}"),
            Self::DetachVolume { volume_id } => write!(f, "detach volume {volume_id}"),
            Self::Unmount {
                volume_id,
                mount_path,
            } => write!(f, "unmount volume {volume_id} from {mount_path}"),
            Self::DeleteCredential { credential_id } => {
                write!(f, "delete credential {credential_id}")
            }
            Self::DeleteAllBackups {
                volume_id,
                credential_id,
            } => write!(
                f,
                "delete all backups of volume {volume_id} under credential {credential_id}"
            ),
            Self::DeleteSchedulePolicy { name } => write!(f, "delete schedule policy {name}"),
            Self::DeleteRole { name } => write!(f, "delete role {name}"),
            Self::DeleteBackupSchedule { schedule_id } => {
                write!(f, "delete backup schedule {schedule_id}")
            }
            Self::DeleteObjectstore { objectstore_id } => {
                write!(f, "delete objectstore {objectstore_id}")
            }
        }
    }
}

/// Boxed future returned by [`CleanupTarget::cleanup`].
pub type CleanupFuture<'a> = Pin<Box<dyn Future<Output = Result<(), CleanupError>> + Send + 'a>>;

/// Something that can carry out cleanup actions.
pub trait CleanupTarget {
    /// Performs `action`.
    fn cleanup<'a>(&'a self, action: &'a CleanupAction) -> CleanupFuture<'a>;
}

/// A cleanup action that did not succeed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{action}: {message}")]
pub struct CleanupError {
    /// The action that failed.
    pub action: CleanupAction,
    /// Server or transport diagnostic.
    pub message: String,
}

/// LIFO stack of pending cleanup actions for one scenario.
#[derive(Debug, Default)]
pub struct Teardown {
    actions: Vec<CleanupAction>,
}

impl Teardown {
    /// Creates an empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Registers `action` to run after the scenario body.
    pub fn push(&mut self, action: CleanupAction) {
        self.actions.push(action);
    }

    /// Withdraws the most recent registration equal to `action`, typically
    /// because the scenario released the resource itself. Returns whether an
    /// entry was removed.
    pub fn dismiss(&mut self, action: &CleanupAction) -> bool {
        let Some(position) = self.actions.iter().rposition(|pending| pending == action) else {
            return false;
        };
        self.actions.remove(position);
        true
    }

    /// Pending actions in registration order.
    #[must_use]
    pub fn pending(&self) -> &[CleanupAction] {
        &self.actions
    }

    /// Runs every pending action, most recent first. A failing action does not
    /// stop the remaining ones; all failures are returned.
    pub async fn run<T>(self, target: &T) -> Vec<CleanupError>
    where
        T: CleanupTarget + ?Sized,
    {
        let mut failures = Vec::new();
        for action in self.actions.iter().rev() {
            debug!(%action, "running cleanup");
            if let Err(err) = target.cleanup(action).await {
                failures.push(err);
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingCleanupTarget;

    #[tokio::test]
    async fn run_executes_in_reverse_order() {
        let mut teardown = Teardown::new();
        teardown.push(CleanupAction::delete_volume("vol-1"));
        teardown.push(CleanupAction::DetachVolume {
            volume_id: String::from("vol-1"),
        });
        let target = RecordingCleanupTarget::default();

        let failures = teardown.run(&target).await;

        assert!(failures.is_empty());
        assert_eq!(
            target.performed(),
            vec![
                CleanupAction::DetachVolume {
                    volume_id: String::from("vol-1"),
                },
                CleanupAction::delete_volume("vol-1"),
            ]
        );
    }

    #[tokio::test]
    async fn run_continues_after_a_failure() {
        let mut teardown = Teardown::new();
        teardown.push(CleanupAction::delete_volume("vol-1"));
        teardown.push(CleanupAction::DeleteRole {
            name: String::from("tester"),
        });
        let target = RecordingCleanupTarget::default();
        target.fail_on(CleanupAction::DeleteRole {
            name: String::from("tester"),
        });

        let failures = teardown.run(&target).await;

        assert_eq!(failures.len(), 1);
        assert_eq!(target.performed().len(), 2);
    }

    #[test]
    fn dismiss_removes_only_the_latest_match() {
        let mut teardown = Teardown::new();
        teardown.push(CleanupAction::delete_volume("vol-1"));
        teardown.push(CleanupAction::delete_volume("vol-1"));

        assert!(teardown.dismiss(&CleanupAction::delete_volume("vol-1")));
        assert_eq!(teardown.pending().len(), 1);
        assert!(!teardown.dismiss(&CleanupAction::delete_volume("vol-2")));
    }
}
