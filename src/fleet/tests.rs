//! Unit tests for fleet workflows against the in-memory provider.

use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::model::{SnapshotStatus, VolumeStatus};
use crate::provider::BlockDeviceMapping;
use crate::test_support::{
    AttachCall, FAKE_ROOT_DEVICE, FakeProvider, FakeProviderError, attached_volume,
    sample_instance,
};

fn config() -> FleetConfig {
    FleetConfig {
        access_key_id: Some(String::from("SCWACCESSKEY")),
        secret_access_key: String::from("secret"),
        default_key: String::from("fallback-key"),
        default_security_group: String::from("sg-default"),
        default_zone: String::from("fr-par-1"),
    }
}

const FAST: WaitSettings = WaitSettings::new(Duration::from_millis(1), Duration::from_millis(500));

#[fixture]
fn provider() -> FakeProvider {
    FakeProvider::demo()
}

async fn manager(provider: &FakeProvider) -> FleetManager<FakeProvider> {
    FleetManager::connect(provider.clone(), config())
        .await
        .unwrap_or_else(|err| panic!("manager should connect: {err}"))
}

fn rendered(sink: Vec<u8>) -> String {
    String::from_utf8(sink).unwrap_or_else(|err| panic!("table output is UTF-8: {err}"))
}

#[rstest]
#[tokio::test]
async fn connect_caches_account_id(provider: FakeProvider) {
    let fleet = manager(&provider).await;
    let mut sink = Vec::new();

    fleet
        .describe_snapshots(&mut sink)
        .await
        .expect("snapshots render");
    fleet
        .describe_snapshots(&mut sink)
        .await
        .expect("snapshots render");

    assert_eq!(fleet.account_id(), "acct-fake");
    let lookups = provider
        .calls()
        .iter()
        .filter(|call| call.as_str() == "account_id")
        .count();
    assert_eq!(lookups, 1);
    assert_eq!(
        provider.snapshot_owners(),
        vec![String::from("acct-fake"), String::from("acct-fake")]
    );
}

#[rstest]
#[tokio::test]
async fn connect_propagates_lookup_failure(provider: FakeProvider) {
    provider.fail_operation("account_id");
    let err = FleetManager::connect(provider, config())
        .await
        .expect_err("lookup fails");
    assert!(matches!(
        err,
        FleetError::Provider(FakeProviderError::Injected(_))
    ));
}

#[rstest]
#[tokio::test]
async fn list_regions_preserves_provider_order(provider: FakeProvider) {
    let fleet = manager(&provider).await;
    assert_eq!(
        fleet.list_regions().await.expect("regions"),
        vec![String::from("fr-par"), String::from("nl-ams")]
    );
}

#[rstest]
#[tokio::test]
async fn describe_instances_renders_one_row_per_instance(provider: FakeProvider) {
    let mut second = sample_instance("i-2");
    second.address = None;
    second.security_groups.push(crate::model::SecurityGroup {
        id: String::from("sg-ssh"),
        name: String::from("ssh"),
    });
    provider.add_instance(second);
    let fleet = manager(&provider).await;
    let mut sink = Vec::new();

    fleet
        .describe_instances(&mut sink)
        .await
        .expect("instances render");

    let text = rendered(sink);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("Instance ID | Type   | Image ID   | Status  | IP Address   | Host"));
    assert!(lines[2].contains("203.0.113.10"));
    assert!(lines[3].ends_with("| web ssh        "));
    let listings = provider
        .calls()
        .iter()
        .filter(|call| call.as_str() == "list_instances")
        .count();
    assert_eq!(listings, 1);
}

#[rstest]
#[tokio::test]
async fn describe_snapshots_formats_size_and_progress(provider: FakeProvider) {
    provider.add_snapshot(crate::model::Snapshot {
        id: String::from("snap-2"),
        description: String::from("pending copy"),
        size_bytes: 1_500_000_000,
        status: SnapshotStatus::Pending,
        progress: None,
    });
    let fleet = manager(&provider).await;
    let mut sink = Vec::new();

    fleet
        .describe_snapshots(&mut sink)
        .await
        .expect("snapshots render");

    let text = rendered(sink);
    assert_eq!(
        text.lines().collect::<Vec<_>>(),
        vec![
            "Snapshot ID | Description  | Size | Status    | Progress",
            "--------------------------------------------------------",
            "snap-1      | nightly      | 50G  | completed | 100     ",
            "snap-2      | pending copy | 2G   | pending   |         ",
        ]
    );
}

#[rstest]
#[tokio::test]
async fn get_instance_volumes_excludes_root_device(provider: FakeProvider) {
    provider.add_volume(attached_volume("vol-other", "i-9", "/dev/sdg", 1));
    let fleet = manager(&provider).await;

    let devices = fleet.get_instance_volumes("i-1").await.expect("volumes");

    assert_eq!(devices.keys().collect::<Vec<_>>(), vec!["/dev/sdf"]);
    assert_eq!(
        devices.get("/dev/sdf").map(|volume| volume.id.as_str()),
        Some("vol-data")
    );
    assert!(!devices.contains_key(FAKE_ROOT_DEVICE));
}

#[rstest]
#[tokio::test]
async fn describe_volumes_renders_device_table(provider: FakeProvider) {
    let fleet = manager(&provider).await;
    let mut sink = Vec::new();

    fleet
        .describe_volumes("i-1", &mut sink)
        .await
        .expect("volumes render");

    assert_eq!(
        rendered(sink),
        "Device   | Volume ID | Size | Status\n\
         ------------------------------------\n\
         /dev/sdf | vol-data  | 50G  | in-use\n"
    );
}

#[rstest]
#[tokio::test]
async fn start_instance_uses_configured_defaults(provider: FakeProvider) {
    let fleet = manager(&provider).await;

    let handles = fleet
        .start_instance("img-1", "DEV1-M", &LaunchOverrides::default())
        .await
        .expect("launch");

    assert_eq!(handles.len(), 1);
    let launches = provider.launches();
    let request = launches.first().expect("one launch");
    assert_eq!(request.image_id, "img-1");
    assert_eq!(request.instance_type, "DEV1-M");
    assert_eq!(request.zone, "fr-par-1");
    assert_eq!(request.key_name.as_deref(), Some("fallback-key"));
    assert_eq!(request.security_groups, vec![String::from("sg-default")]);
    assert_eq!(request.count, 1);
}

#[rstest]
#[tokio::test]
async fn start_instance_honours_overrides(provider: FakeProvider) {
    let fleet = manager(&provider).await;
    let overrides = LaunchOverrides {
        key_name: Some(String::from("mine")),
        security_groups: Some(vec![String::from("sg-a"), String::from("sg-b")]),
        count: Some(3),
        ..LaunchOverrides::default()
    };

    let handles = fleet
        .start_instance("img-1", "DEV1-M", &overrides)
        .await
        .expect("launch");

    assert_eq!(handles.len(), 3);
    let launches = provider.launches();
    let request = launches.first().expect("one launch");
    assert_eq!(request.key_name.as_deref(), Some("mine"));
    assert_eq!(
        request.security_groups,
        vec![String::from("sg-a"), String::from("sg-b")]
    );
}

#[rstest]
#[tokio::test]
async fn zero_count_is_rejected_before_any_launch(provider: FakeProvider) {
    let fleet = manager(&provider).await;
    let overrides = LaunchOverrides {
        count: Some(0),
        ..LaunchOverrides::default()
    };

    let err = fleet
        .duplicate_instance_with_volumes("i-1", &overrides, FAST)
        .await
        .expect_err("zero count");

    assert!(matches!(err, FleetError::InvalidCount));
    assert!(provider.snapshot_requests().is_empty());
    assert!(provider.launches().is_empty());
}

#[rstest]
#[tokio::test]
async fn terminate_instance_issues_one_request(provider: FakeProvider) {
    let fleet = manager(&provider).await;
    fleet.terminate_instance("i-1").await.expect("terminate");
    assert_eq!(provider.terminated(), vec![String::from("i-1")]);
}

#[rstest]
#[tokio::test]
async fn duplicate_instance_reproduces_source(provider: FakeProvider) {
    let fleet = manager(&provider).await;

    fleet
        .duplicate_instance("i-1", &LaunchOverrides::default())
        .await
        .expect("duplicate");

    let launches = provider.launches();
    let request = launches.first().expect("one launch");
    assert_eq!(request.image_id, "img-ubuntu");
    assert_eq!(request.instance_type, "DEV1-S");
    assert_eq!(request.key_name.as_deref(), Some("ops"));
    assert_eq!(request.security_groups, vec![String::from("sg-web")]);
    assert!(request.block_devices.is_empty());
    assert!(provider.snapshot_requests().is_empty());
}

#[rstest]
#[tokio::test]
async fn duplicate_instance_falls_back_to_default_key() {
    let provider = FakeProvider::new();
    let mut source = sample_instance("i-7");
    source.key_name = None;
    provider.add_instance(source);
    let fleet = manager(&provider).await;
    let overrides = LaunchOverrides {
        instance_type: Some(String::from("GP1-XS")),
        count: Some(2),
        ..LaunchOverrides::default()
    };

    fleet
        .duplicate_instance("i-7", &overrides)
        .await
        .expect("duplicate");

    let launches = provider.launches();
    let request = launches.first().expect("one launch");
    assert_eq!(request.key_name.as_deref(), Some("fallback-key"));
    assert_eq!(request.instance_type, "GP1-XS");
    assert_eq!(request.image_id, "img-ubuntu");
    assert_eq!(request.count, 2);
}

#[rstest]
#[tokio::test]
async fn duplicate_instance_reports_missing_source(provider: FakeProvider) {
    let fleet = manager(&provider).await;
    let err = fleet
        .duplicate_instance("i-404", &LaunchOverrides::default())
        .await
        .expect_err("missing source");
    assert!(matches!(
        err,
        FleetError::Provider(FakeProviderError::NotFound { .. })
    ));
}

#[rstest]
#[tokio::test]
async fn duplicate_with_volumes_maps_snapshots_to_devices(provider: FakeProvider) {
    provider.push_snapshot_status(SnapshotStatus::Pending);
    provider.push_snapshot_status(SnapshotStatus::Completed);
    let fleet = manager(&provider).await;

    let handles = fleet
        .duplicate_instance_with_volumes("i-1", &LaunchOverrides::default(), FAST)
        .await
        .expect("duplicate with volumes");

    assert_eq!(handles.len(), 1);
    let snapshot_requests = provider.snapshot_requests();
    assert_eq!(snapshot_requests.len(), 1);
    assert_eq!(
        snapshot_requests.first().map(|req| req.volume_id.as_str()),
        Some("vol-data")
    );
    let launches = provider.launches();
    let request = launches.first().expect("one launch");
    assert_eq!(
        request.block_devices,
        vec![BlockDeviceMapping {
            device: String::from("/dev/sdf"),
            snapshot_id: String::from("snap-fake-1"),
        }]
    );
    assert_eq!(request.image_id, "img-ubuntu");
    let polls = provider
        .calls()
        .iter()
        .filter(|call| call.as_str() == "snapshot_status")
        .count();
    assert_eq!(polls, 2);
}

#[rstest]
#[tokio::test]
async fn duplicate_with_volumes_aborts_on_snapshot_error(provider: FakeProvider) {
    provider.push_snapshot_status(SnapshotStatus::Error);
    let fleet = manager(&provider).await;

    let err = fleet
        .duplicate_instance_with_volumes("i-1", &LaunchOverrides::default(), FAST)
        .await
        .expect_err("snapshot error aborts");

    match err {
        FleetError::Poll { resource, reason } => {
            assert_eq!(resource, "snapshot snap-fake-1");
            assert_eq!(reason, "error");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(provider.launches().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn duplicate_with_volumes_times_out(provider: FakeProvider) {
    for _ in 0..10 {
        provider.push_snapshot_status(SnapshotStatus::Pending);
    }
    let fleet = manager(&provider).await;
    let wait = WaitSettings::new(Duration::from_secs(15), Duration::from_secs(40));

    let err = fleet
        .duplicate_instance_with_volumes("i-1", &LaunchOverrides::default(), wait)
        .await
        .expect_err("times out");

    assert!(matches!(err, FleetError::PollTimeout { .. }));
    assert!(provider.launches().is_empty());
}

#[rstest]
#[tokio::test]
async fn duplicate_with_volumes_rejects_imageless_source_before_snapshotting() {
    let provider = FakeProvider::new();
    let mut source = sample_instance("i-noimage");
    source.image_id = String::new();
    provider.add_instance(source);
    provider.add_volume(attached_volume("vol-data", "i-noimage", "/dev/sdf", 50));
    let fleet = manager(&provider).await;

    let err = fleet
        .duplicate_instance_with_volumes("i-noimage", &LaunchOverrides::default(), FAST)
        .await
        .expect_err("image is required");

    assert!(matches!(
        err,
        FleetError::MissingParameter { ref field } if field == "image_id"
    ));
    assert!(provider.snapshot_requests().is_empty());
    assert!(provider.launches().is_empty());
}

#[rstest]
#[tokio::test]
async fn duplicate_with_volumes_accepts_unbounded_timeout(provider: FakeProvider) {
    provider.push_snapshot_status(SnapshotStatus::Pending);
    provider.push_snapshot_status(SnapshotStatus::Completed);
    let fleet = manager(&provider).await;
    let wait = WaitSettings::new(Duration::from_millis(1), Duration::MAX);

    let handles = fleet
        .duplicate_instance_with_volumes("i-1", &LaunchOverrides::default(), wait)
        .await
        .expect("an oversized timeout still waits");

    assert_eq!(handles.len(), 1);
}

#[rstest]
#[tokio::test]
async fn duplicate_without_volumes_launches_without_mappings() {
    let provider = FakeProvider::new();
    provider.add_instance(sample_instance("i-bare"));
    let fleet = manager(&provider).await;

    fleet
        .duplicate_instance_with_volumes("i-bare", &LaunchOverrides::default(), FAST)
        .await
        .expect("duplicate");

    assert!(provider.snapshot_requests().is_empty());
    let launches = provider.launches();
    assert!(launches.first().expect("launch").block_devices.is_empty());
}

#[rstest]
#[tokio::test]
async fn attach_snapshot_waits_then_attaches(provider: FakeProvider) {
    provider.push_volume_status(VolumeStatus::Pending);
    let fleet = manager(&provider).await;

    let volume = fleet
        .attach_snapshot_instance("snap-1", "i-1", "/dev/sdh", FAST)
        .await
        .expect("attach");

    let requests = provider.volume_requests();
    let request = requests.first().expect("volume requested");
    assert_eq!(request.snapshot_id, "snap-1");
    assert_eq!(request.zone, "fr-par-1");
    assert_eq!(
        provider.attachments(),
        vec![AttachCall {
            volume_id: volume.id,
            instance_id: String::from("i-1"),
            device: String::from("/dev/sdh"),
        }]
    );
}

#[rstest]
#[tokio::test]
async fn attach_snapshot_aborts_when_volume_fails(provider: FakeProvider) {
    provider.push_volume_status(VolumeStatus::Error);
    let fleet = manager(&provider).await;

    let err = fleet
        .attach_snapshot_instance("snap-1", "i-1", "/dev/sdh", FAST)
        .await
        .expect_err("volume error");

    assert!(matches!(err, FleetError::Poll { .. }));
    assert!(provider.attachments().is_empty());
}

#[rstest]
#[tokio::test]
async fn render_errors_surface_as_render_variant(provider: FakeProvider) {
    struct Closed;
    impl std::io::Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
    let fleet = manager(&provider).await;

    let err = fleet
        .describe_instances(&mut Closed)
        .await
        .expect_err("closed sink");

    assert!(matches!(err, FleetError::Render(TableError::Io(_))));
}
