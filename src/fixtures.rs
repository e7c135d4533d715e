//! Request builders and response comparisons shared by the scenarios.

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::api::{
    CosType, FsType, IoProfile, SdkAwsCredentialRequest, SdkCredentialCreateRequest,
    SdkSchedulePolicy, SdkSchedulePolicyInterval, SdkSchedulePolicyIntervalDaily,
    SdkSchedulePolicyIntervalWeekly, SdkTimeWeekday, SdkVolumeCreateRequest, Volume, VolumeSpec,
    sdk_credential_create_request::CredentialType, sdk_schedule_policy_interval::PeriodType,
};
use crate::suite::ScenarioError;

/// One gibibyte in bytes.
pub const GIB: u64 = 1 << 30;

/// Spec fields the reference driver does not echo back, so create/inspect
/// comparisons leave them out.
pub const UNCOMPARED_SPEC_FIELDS: [&str; 7] = [
    "aggregation_level",
    "cos",
    "encrypted",
    "format",
    "ha_level",
    "io_profile",
    "sticky",
];

/// Returns `<prefix>-<unix seconds>-<8 hex chars>` so reruns against the same
/// server never collide on resource names.
#[must_use]
pub fn unique_name(prefix: &str) -> String {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());
    let suffix = Uuid::new_v4().simple().to_string();
    let short = suffix.get(..8).unwrap_or(suffix.as_str());
    format!("{prefix}-{seconds}-{short}")
}

/// Name for a snapshot of `volume_id`.
#[must_use]
pub fn snapshot_name(volume_id: &str) -> String {
    unique_name(&format!("snap-{volume_id}"))
}

/// Create request with only a size and HA level, as most scenarios need.
#[must_use]
pub fn sized_volume_request(name: &str, size: u64, ha_level: i64) -> SdkVolumeCreateRequest {
    SdkVolumeCreateRequest {
        name: name.to_owned(),
        spec: Some(VolumeSpec {
            size,
            ha_level,
            ..VolumeSpec::default()
        }),
        ..SdkVolumeCreateRequest::default()
    }
}

/// The standard test volume: 5 GiB, HA 3, DB profile, high CoS, XFS.
#[must_use]
pub fn test_volume_request(name: &str) -> SdkVolumeCreateRequest {
    SdkVolumeCreateRequest {
        name: name.to_owned(),
        spec: Some(VolumeSpec {
            size: 5 * GIB,
            shared: false,
            ha_level: 3,
            io_profile: IoProfile::Db.into(),
            cos: CosType::High.into(),
            format: FsType::Xfs.into(),
            ..VolumeSpec::default()
        }),
        ..SdkVolumeCreateRequest::default()
    }
}

/// Volume used to host an object store: the standard volume plus
/// aggregation, encryption and stickiness.
#[must_use]
pub fn objectstore_volume_request(name: &str) -> SdkVolumeCreateRequest {
    let mut request = test_volume_request(name);
    if let Some(spec) = request.spec.as_mut() {
        spec.aggregation_level = 2;
        spec.encrypted = true;
        spec.sticky = true;
    }
    request
}

/// Static AWS credential named `name`. It needs no provider file, and its
/// keys are not expected to validate against a real bucket.
#[must_use]
pub fn test_credential_request(name: &str) -> SdkCredentialCreateRequest {
    SdkCredentialCreateRequest {
        name: name.to_owned(),
        credential_type: Some(CredentialType::AwsCredential(SdkAwsCredentialRequest {
            access_key: String::from("aws-access-key"),
            secret_key: String::from("AWS_SECRET_KEY_$$"),
            endpoint: String::from("s3.aws.com"),
            region: String::from("us-east"),
            disable_ssl: false,
        })),
        ..SdkCredentialCreateRequest::default()
    }
}

/// Daily interval at `hour:minute`, keeping `retain` snapshots.
#[must_use]
pub fn daily_interval(hour: i32, minute: i32, retain: i64) -> SdkSchedulePolicyInterval {
    SdkSchedulePolicyInterval {
        retain,
        period_type: Some(PeriodType::Daily(SdkSchedulePolicyIntervalDaily {
            hour,
            minute,
        })),
    }
}

/// Weekly interval on `day` at `hour:minute`, keeping `retain` snapshots.
#[must_use]
pub fn weekly_interval(
    day: SdkTimeWeekday,
    hour: i32,
    minute: i32,
    retain: i64,
) -> SdkSchedulePolicyInterval {
    SdkSchedulePolicyInterval {
        retain,
        period_type: Some(PeriodType::Weekly(SdkSchedulePolicyIntervalWeekly {
            day: day.into(),
            hour,
            minute,
        })),
    }
}

/// Schedule policy named `name` with the given intervals.
#[must_use]
pub fn schedule_policy(name: &str, schedules: Vec<SdkSchedulePolicyInterval>) -> SdkSchedulePolicy {
    SdkSchedulePolicy {
        name: name.to_owned(),
        schedules,
    }
}

fn compare<T: PartialEq + std::fmt::Debug>(
    field: &str,
    requested: &T,
    returned: &T,
) -> Result<(), ScenarioError> {
    if requested == returned {
        return Ok(());
    }
    Err(ScenarioError::Assertion(format!(
        "volume field {field} does not round-trip: requested {requested:?}, inspected {returned:?}"
    )))
}

/// Checks that every round-tripped spec field of `volume` matches `request`.
/// Fields listed in [`UNCOMPARED_SPEC_FIELDS`] are ignored.
///
/// # Errors
///
/// Returns [`ScenarioError::Assertion`] naming the first field that differs,
/// or when either side carries no spec.
pub fn compare_volume_details(
    request: &SdkVolumeCreateRequest,
    volume: &Volume,
) -> Result<(), ScenarioError> {
    let (Some(want), Some(got)) = (request.spec.as_ref(), volume.spec.as_ref()) else {
        return Err(ScenarioError::Assertion(String::from(
            "volume spec missing from request or inspect response",
        )));
    };

    compare("ephemeral", &want.ephemeral, &got.ephemeral)?;
    compare("cascaded", &want.cascaded, &got.cascaded)?;
    compare("compressed", &want.compressed, &got.compressed)?;
    compare("dedupe", &want.dedupe, &got.dedupe)?;
    compare("group", &want.group, &got.group)?;
    compare("group_enforced", &want.group_enforced, &got.group_enforced)?;
    compare("journal", &want.journal, &got.journal)?;
    compare("sharedv4", &want.sharedv4, &got.sharedv4)?;
    compare("passphrase", &want.passphrase, &got.passphrase)?;
    compare("replica_set", &want.replica_set, &got.replica_set)?;
    compare("scale", &want.scale, &got.scale)?;
    compare("shared", &want.shared, &got.shared)?;
    compare("size", &want.size, &got.size)?;
    compare(
        "snapshot_interval",
        &want.snapshot_interval,
        &got.snapshot_interval,
    )?;
    compare(
        "snapshot_schedule",
        &want.snapshot_schedule,
        &got.snapshot_schedule,
    )?;

    let parent = volume
        .source
        .as_ref()
        .map_or("", |source| source.parent.as_str());
    if !parent.is_empty() {
        return Err(ScenarioError::Assertion(format!(
            "new volume unexpectedly has parent {parent}"
        )));
    }

    let name = volume
        .locator
        .as_ref()
        .map_or("", |locator| locator.name.as_str());
    compare("locator.name", &request.name.as_str(), &name)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::api::{Source, VolumeLocator};

    fn inspected(request: &SdkVolumeCreateRequest) -> Volume {
        Volume {
            id: String::from("vol-1"),
            spec: request.spec.clone(),
            locator: Some(VolumeLocator {
                name: request.name.clone(),
                ..VolumeLocator::default()
            }),
            source: Some(Source::default()),
            ..Volume::default()
        }
    }

    #[test]
    fn identical_volume_passes() {
        let request = test_volume_request("sdk-vol");
        assert!(compare_volume_details(&request, &inspected(&request)).is_ok());
    }

    #[test]
    fn uncompared_fields_may_differ() {
        let request = test_volume_request("sdk-vol");
        let mut volume = inspected(&request);
        if let Some(spec) = volume.spec.as_mut() {
            spec.ha_level = 1;
            spec.cos = CosType::Low.into();
            spec.format = FsType::Ext4.into();
            spec.sticky = true;
        }
        assert!(compare_volume_details(&request, &volume).is_ok());
    }

    #[rstest]
    #[case::size("size", |spec: &mut VolumeSpec| spec.size = 1)]
    #[case::shared("shared", |spec: &mut VolumeSpec| spec.shared = true)]
    #[case::journal("journal", |spec: &mut VolumeSpec| spec.journal = true)]
    #[case::schedule("snapshot_schedule", |spec: &mut VolumeSpec| {
        spec.snapshot_schedule = String::from("policy=nightly");
    })]
    fn mismatch_names_the_field(#[case] field: &str, #[case] mutate: fn(&mut VolumeSpec)) {
        let request = test_volume_request("sdk-vol");
        let mut volume = inspected(&request);
        if let Some(spec) = volume.spec.as_mut() {
            mutate(spec);
        }

        let err = compare_volume_details(&request, &volume).expect_err("mismatch");
        let ScenarioError::Assertion(message) = err else {
            panic!("unexpected error variant");
        };
        assert!(message.contains(field), "message: {message}");
    }

    #[test]
    fn cloned_volume_fails_parent_check() {
        let request = test_volume_request("sdk-vol");
        let mut volume = inspected(&request);
        volume.source = Some(Source {
            parent: String::from("vol-0"),
            ..Source::default()
        });
        assert!(compare_volume_details(&request, &volume).is_err());
    }

    #[test]
    fn locator_name_must_match() {
        let request = test_volume_request("sdk-vol");
        let mut volume = inspected(&request);
        volume.locator = None;
        assert!(compare_volume_details(&request, &volume).is_err());
    }

    #[test]
    fn static_credential_is_an_aws_request_under_the_given_name() {
        let request = test_credential_request("test-credential-1");

        assert_eq!(request.name, "test-credential-1");
        let Some(CredentialType::AwsCredential(aws)) = request.credential_type else {
            panic!("expected an aws credential");
        };
        assert_eq!(aws.region, "us-east");
        assert!(!aws.access_key.is_empty());
    }

    #[test]
    fn unique_names_differ() {
        let first = unique_name("sdk-vol");
        let second = unique_name("sdk-vol");
        assert!(first.starts_with("sdk-vol-"));
        assert_ne!(first, second);
    }
}
