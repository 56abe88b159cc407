//! BDD step definitions for instance duplication.

use std::time::Duration;

use flotilla::model::SnapshotStatus;
use flotilla::provider::LaunchRequest;
use flotilla::test_support::{attached_volume, sample_instance};
use flotilla::{FleetManager, LaunchOverrides, WaitSettings};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{DuplicateContext, DuplicateResult, SOURCE_ID};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("step execution failed: {0}")]
    Execution(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

const GIB: u64 = 1_000_000_000;

fn fast_wait() -> WaitSettings {
    WaitSettings::new(Duration::from_millis(1), Duration::from_secs(5))
}

fn only_launch(duplicate_context: &DuplicateContext) -> Result<LaunchRequest, StepError> {
    let launches = duplicate_context.provider.launches();
    match launches.as_slice() {
        [request] => Ok(request.clone()),
        other => Err(StepError::Assertion(format!(
            "expected exactly one launch, got {}",
            other.len()
        ))),
    }
}

#[given("a fleet with a running source instance")]
fn running_source(duplicate_context: DuplicateContext) -> DuplicateContext {
    duplicate_context.provider.add_instance(sample_instance(SOURCE_ID));
    duplicate_context
}

#[given("a fleet with a source instance that has no key")]
fn keyless_source(duplicate_context: DuplicateContext) -> DuplicateContext {
    let mut source = sample_instance(SOURCE_ID);
    source.key_name = None;
    duplicate_context.provider.add_instance(source);
    duplicate_context
}

#[given("the source has a data volume at \"{device}\"")]
fn source_data_volume(duplicate_context: DuplicateContext, device: String) -> DuplicateContext {
    duplicate_context.provider.add_volume(attached_volume(
        "vol-root",
        SOURCE_ID,
        flotilla::test_support::FAKE_ROOT_DEVICE,
        10 * GIB,
    ));
    duplicate_context
        .provider
        .add_volume(attached_volume("vol-data", SOURCE_ID, &device, 50 * GIB));
    duplicate_context
}

#[given("snapshots fail to complete")]
fn snapshots_fail(duplicate_context: DuplicateContext) -> DuplicateContext {
    duplicate_context
        .provider
        .push_snapshot_status(SnapshotStatus::Error);
    duplicate_context
}

fn run_duplication(
    duplicate_context: DuplicateContext,
    with_volumes: bool,
) -> Result<DuplicateContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Execution(err.to_string()))?;
    let provider = duplicate_context.provider.clone();
    let config = duplicate_context.config.clone();
    let result = runtime.block_on(async move {
        let fleet = FleetManager::connect(provider, config).await?;
        let overrides = LaunchOverrides::default();
        if with_volumes {
            fleet
                .duplicate_instance_with_volumes(SOURCE_ID, &overrides, fast_wait())
                .await
        } else {
            fleet.duplicate_instance(SOURCE_ID, &overrides).await
        }
    });
    let outcome = match result {
        Ok(handles) => DuplicateResult::Launched(handles.into_iter().map(|handle| handle.id).collect()),
        Err(err) => DuplicateResult::Failed(err.to_string()),
    };
    Ok(DuplicateContext {
        outcome: Some(outcome),
        ..duplicate_context
    })
}

#[when("I duplicate the source instance")]
fn duplicate_source(duplicate_context: DuplicateContext) -> Result<DuplicateContext, StepError> {
    run_duplication(duplicate_context, false)
}

#[when("I duplicate the source instance with its volumes")]
fn duplicate_source_with_volumes(
    duplicate_context: DuplicateContext,
) -> Result<DuplicateContext, StepError> {
    run_duplication(duplicate_context, true)
}

#[then("the launch uses image \"{image}\" and type \"{instance_type}\"")]
fn launch_uses_image_and_type(
    duplicate_context: &DuplicateContext,
    image: String,
    instance_type: String,
) -> Result<(), StepError> {
    let request = only_launch(duplicate_context)?;
    if request.image_id == image && request.instance_type == instance_type {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {image}/{instance_type}, got {}/{}",
            request.image_id, request.instance_type
        )))
    }
}

#[then("the launch uses key \"{key}\"")]
fn launch_uses_key(duplicate_context: &DuplicateContext, key: String) -> Result<(), StepError> {
    let request = only_launch(duplicate_context)?;
    if request.key_name.as_deref() == Some(key.as_str()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected key {key}, got {:?}",
            request.key_name
        )))
    }
}

#[then("the launch carries no block devices")]
fn launch_without_devices(duplicate_context: &DuplicateContext) -> Result<(), StepError> {
    let request = only_launch(duplicate_context)?;
    if request.block_devices.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no block devices, got {:?}",
            request.block_devices
        )))
    }
}

#[then("the launch maps \"{device}\" to a fresh snapshot")]
fn launch_maps_device(duplicate_context: &DuplicateContext, device: String) -> Result<(), StepError> {
    let request = only_launch(duplicate_context)?;
    let requested: Vec<String> = duplicate_context
        .provider
        .snapshot_requests()
        .into_iter()
        .map(|snapshot| snapshot.volume_id)
        .collect();
    if requested != vec![String::from("vol-data")] {
        return Err(StepError::Assertion(format!(
            "expected a snapshot of vol-data, got {requested:?}"
        )));
    }
    match request.block_devices.as_slice() {
        [mapping] if mapping.device == device && mapping.snapshot_id.starts_with("snap-") => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {device} mapped to a snapshot, got {other:?}"
        ))),
    }
}

#[then("no snapshot is requested for the root volume")]
fn root_not_snapshotted(duplicate_context: &DuplicateContext) -> Result<(), StepError> {
    let root_requested = duplicate_context
        .provider
        .snapshot_requests()
        .iter()
        .any(|snapshot| snapshot.volume_id == "vol-root");
    if root_requested {
        Err(StepError::Assertion(String::from(
            "root volume should not be snapshotted",
        )))
    } else {
        Ok(())
    }
}

#[then("the duplication fails mentioning \"{text}\"")]
fn duplication_fails(duplicate_context: &DuplicateContext, text: String) -> Result<(), StepError> {
    match &duplicate_context.outcome {
        Some(DuplicateResult::Failed(message)) if message.contains(&text) => Ok(()),
        Some(DuplicateResult::Failed(message)) => Err(StepError::Assertion(format!(
            "expected error mentioning {text}, got {message}"
        ))),
        Some(DuplicateResult::Launched(ids)) => Err(StepError::Assertion(format!(
            "expected failure, launched {ids:?}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("no instance is launched")]
fn nothing_launched(duplicate_context: &DuplicateContext) -> Result<(), StepError> {
    let launches = duplicate_context.provider.launches();
    if launches.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no launches, got {launches:?}"
        )))
    }
}
