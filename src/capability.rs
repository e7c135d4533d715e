//! Server capability lookup.

use std::fmt;

use crate::api::sdk_service_capability::{self, open_storage_service::Type as ServiceType};
use crate::api::{SdkIdentityCapabilitiesResponse, SdkServiceCapability};

/// Optional service areas a server may advertise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Cluster inspection and alerts.
    Cluster,
    /// Cloud backups and backup schedules.
    CloudBackup,
    /// Object store credentials.
    Credentials,
    /// Node inspection.
    Node,
    /// Object store management.
    ObjectStorage,
    /// Schedule policies.
    SchedulePolicy,
    /// Volume and snapshot management.
    Volume,
}

impl Capability {
    /// Every capability the suite recognises.
    pub const ALL: [Self; 7] = [
        Self::Cluster,
        Self::CloudBackup,
        Self::Credentials,
        Self::Node,
        Self::ObjectStorage,
        Self::SchedulePolicy,
        Self::Volume,
    ];

    /// Wire value of the capability type.
    #[must_use]
    pub const fn service_type(self) -> ServiceType {
        match self {
            Self::Cluster => ServiceType::Cluster,
            Self::CloudBackup => ServiceType::CloudBackup,
            Self::Credentials => ServiceType::Credentials,
            Self::Node => ServiceType::Node,
            Self::ObjectStorage => ServiceType::ObjectStorage,
            Self::SchedulePolicy => ServiceType::SchedulePolicy,
            Self::Volume => ServiceType::Volume,
        }
    }

    /// Maps a raw wire value back to a capability. Unknown values, including
    /// `UNKNOWN`, yield `None`.
    #[must_use]
    pub fn from_raw(raw: i32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|capability| capability.service_type() as i32 == raw)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_type().as_str_name())
    }
}

/// Raw service type advertised by one capability entry, or `None` when the
/// entry carries no service.
#[must_use]
pub fn raw_service_type(capability: &SdkServiceCapability) -> Option<i32> {
    match &capability.r#type {
        Some(sdk_service_capability::Type::Service(service)) => Some(service.r#type),
        None => None,
    }
}

/// Raw service types advertised in a capabilities response.
#[must_use]
pub fn advertised(response: &SdkIdentityCapabilitiesResponse) -> Vec<i32> {
    response
        .capabilities
        .iter()
        .filter_map(raw_service_type)
        .collect()
}

/// Returns whether `capability` appears among `advertised` raw types.
#[must_use]
pub fn supported(advertised: &[i32], capability: Capability) -> bool {
    advertised.contains(&(capability.service_type() as i32))
}
