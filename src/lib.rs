//! Conformance suite for OpenStorage SDK gRPC servers.
//!
//! The crate connects to a running SDK endpoint, asks which services it
//! advertises and drives a catalogue of scenarios against the volume,
//! snapshot, schedule policy, credential, cloud backup, cluster, node, role,
//! identity and object store services. Every resource a scenario creates is
//! released again through a per-scenario teardown stack.

pub mod api;
pub mod auth;
pub mod capability;
pub mod config;
pub mod connection;
pub mod expect;
pub mod fixtures;
pub mod poll;
pub mod provider;
pub mod runner;
pub mod suite;
pub mod test_support;

pub use auth::{AuthError, TestUser, TokenInterceptor};
pub use capability::Capability;
pub use config::{ConfigError, SanityConfig};
pub use connection::{ConnectionError, connect};
pub use poll::{BackupPoller, BackupStatusSource, PollError, PollPolicy, PollReport};
pub use provider::{CloudProviderConfig, ProviderConfigError, ProviderCredential};
pub use runner::{Outcome, RunOptions, Runner, RunnerError, ScenarioRecord, SuiteReport};
pub use suite::{
    CleanupAction, CleanupError, CleanupTarget, Group, Requirement, Scenario, ScenarioError,
    Session, Teardown, UnknownGroup, catalogue,
};
