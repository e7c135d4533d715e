//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, MutexGuard};
use tonic::transport::Endpoint;

use crate::api::SdkCloudBackupStatusType;
use crate::auth::AuthError;
use crate::config::{DEFAULT_TOKEN_ISSUER, SanityConfig};
use crate::poll::{BackupStatusSource, PollError, StatusFuture};
use crate::provider::CloudProviderConfig;
use crate::suite::Session;
use crate::suite::teardown::{CleanupAction, CleanupError, CleanupFuture, CleanupTarget};

/// Address that never answers; channels to it are built lazily and fail on
/// first use.
pub const UNREACHABLE_ENDPOINT: &str = "http://[::1]:1";

/// Configuration pointing at [`UNREACHABLE_ENDPOINT`] with default timings
/// and no optional inputs.
#[must_use]
pub fn offline_config() -> SanityConfig {
    SanityConfig {
        endpoint: UNREACHABLE_ENDPOINT.to_owned(),
        mount_path: None,
        provider_config: None,
        shared_secret: None,
        token_issuer: DEFAULT_TOKEN_ISSUER.to_owned(),
        connect_timeout_secs: 1,
        backup_poll_interval_secs: 1,
        backup_poll_budget_secs: 1,
        backup_poll_ceiling_secs: 1,
    }
}

/// Builds a session over a lazy channel that is never connected. Scenario
/// bodies that issue RPCs against it fail with `Unavailable`.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns [`AuthError`] when `config` carries a secret that cannot sign the
/// admin token.
pub fn offline_session(
    config: SanityConfig,
    providers: Option<CloudProviderConfig>,
) -> Result<Session, AuthError> {
    let channel = Endpoint::from_static(UNREACHABLE_ENDPOINT).connect_lazy();
    Session::new(channel, config, providers)
}

/// Scripted status source that replays statuses in FIFO order.
///
/// Once the script is exhausted the last status is repeated, which models a
/// backup that stays in one state indefinitely.
#[derive(Debug, Default)]
pub struct ScriptedStatusSource {
    statuses: StdMutex<VecDeque<Option<SdkCloudBackupStatusType>>>,
    last: StdMutex<Option<SdkCloudBackupStatusType>>,
    failure: Option<String>,
    queried: StdMutex<Vec<String>>,
}

impl ScriptedStatusSource {
    /// Creates a source that replays `statuses`.
    #[must_use]
    pub fn new<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Option<SdkCloudBackupStatusType>>,
    {
        Self {
            statuses: StdMutex::new(statuses.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Creates a source whose every query fails with `message`.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_owned()),
            ..Self::default()
        }
    }

    /// Volume identifiers queried so far, in order.
    #[must_use]
    pub fn queried_volumes(&self) -> Vec<String> {
        self.queried
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_status(&self) -> Option<SdkCloudBackupStatusType> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(status) = self
            .statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            *last = status;
        }
        *last
    }
}

impl BackupStatusSource for ScriptedStatusSource {
    fn status<'a>(&'a self, volume_id: &'a str) -> StatusFuture<'a> {
        Box::pin(async move {
            self.queried
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(volume_id.to_owned());
            if let Some(message) = &self.failure {
                return Err(PollError::Rpc {
                    volume_id: volume_id.to_owned(),
                    message: message.clone(),
                });
            }
            Ok(self.next_status())
        })
    }
}

/// Cleanup target that records every action and fails selected ones.
#[derive(Debug, Default)]
pub struct RecordingCleanupTarget {
    performed: StdMutex<Vec<CleanupAction>>,
    failing: StdMutex<Vec<CleanupAction>>,
}

impl RecordingCleanupTarget {
    /// Makes `action` fail when it is performed.
    pub fn fail_on(&self, action: CleanupAction) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
    }

    /// Actions performed so far, in execution order.
    #[must_use]
    pub fn performed(&self) -> Vec<CleanupAction> {
        self.performed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CleanupTarget for RecordingCleanupTarget {
    fn cleanup<'a>(&'a self, action: &'a CleanupAction) -> CleanupFuture<'a> {
        Box::pin(async move {
            self.performed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(action.clone());
            let fails = self
                .failing
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(action);
            if fails {
                return Err(CleanupError {
                    action: action.clone(),
                    message: String::from("simulated cleanup failure"),
                });
            }
            Ok(())
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }

    /// Removes variables for the lifetime of the guard.
    pub async fn remove_vars(keys: &[&str]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(keys.len());
        for key in keys {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
