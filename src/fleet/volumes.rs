//! Snapshot-backed duplication and snapshot restore workflows.

use std::collections::BTreeMap;

use crate::model::{SnapshotStatus, VolumeStatus};
use crate::provider::{
    BlockDeviceMapping, InstanceHandle, Provider, SnapshotHandle, VolumeHandle, VolumeRequest,
};
use crate::wait::{Readiness, WaitSettings, wait_until};

use super::{FleetError, FleetManager, LaunchOverrides};

fn snapshot_readiness(status: SnapshotStatus) -> Readiness<()> {
    match status {
        SnapshotStatus::Completed => Readiness::Ready(()),
        SnapshotStatus::Error => Readiness::Failed(status.to_string()),
        SnapshotStatus::Pending | SnapshotStatus::Other(_) => Readiness::Pending,
    }
}

fn volume_readiness(status: VolumeStatus) -> Readiness<()> {
    match status {
        VolumeStatus::Available => Readiness::Ready(()),
        // A fresh volume attached elsewhere will never become available.
        VolumeStatus::Error | VolumeStatus::InUse => Readiness::Failed(status.to_string()),
        VolumeStatus::Pending | VolumeStatus::Other(_) => Readiness::Pending,
    }
}

impl<P> FleetManager<P>
where
    P: Provider,
{
    /// Launches copies of `instance_id` whose extra volumes are restored from
    /// fresh snapshots of the source's volumes.
    ///
    /// Snapshots are requested one per attached non-root volume and waited
    /// on in turn. Nothing is rolled back when a later step fails.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InvalidCount`] before any remote call,
    /// [`FleetError::MissingParameter`] before any snapshot is requested,
    /// [`FleetError::Poll`] when a snapshot fails, [`FleetError::PollTimeout`]
    /// when one does not complete in time, and [`FleetError::Provider`] for
    /// any failed call.
    pub async fn duplicate_instance_with_volumes(
        &self,
        instance_id: &str,
        overrides: &LaunchOverrides,
        wait: WaitSettings,
    ) -> Result<Vec<InstanceHandle>, FleetError<P::Error>> {
        overrides.resolved_count::<P::Error>()?;
        let source = self
            .provider
            .describe_instance(instance_id)
            .await
            .map_err(FleetError::Provider)?;
        let mut request = self.duplicate_request(&source, overrides, Vec::new())?;
        let devices = self.get_instance_volumes(instance_id).await?;

        let mut snapshots: BTreeMap<String, SnapshotHandle> = BTreeMap::new();
        for (device, volume) in &devices {
            let description = format!("{instance_id} {device} ({})", volume.id);
            let handle = self
                .provider
                .create_snapshot(&volume.id, &description)
                .await
                .map_err(FleetError::Provider)?;
            tracing::info!(
                snapshot_id = %handle.id,
                volume_id = %volume.id,
                device = %device,
                "snapshot requested"
            );
            snapshots.insert(device.clone(), handle);
        }

        for handle in snapshots.values() {
            self.wait_for_snapshot(&handle.id, wait).await?;
        }

        request.block_devices = snapshots
            .into_iter()
            .map(|(device, handle)| BlockDeviceMapping {
                device,
                snapshot_id: handle.id,
            })
            .collect();
        self.launch(&request).await
    }

    /// Restores `snapshot_id` into a new volume in the instance's zone and
    /// attaches it at `device` once available.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Poll`] when the volume fails,
    /// [`FleetError::PollTimeout`] when it does not become available in time,
    /// and [`FleetError::Provider`] for any failed call.
    pub async fn attach_snapshot_instance(
        &self,
        snapshot_id: &str,
        instance_id: &str,
        device: &str,
        wait: WaitSettings,
    ) -> Result<VolumeHandle, FleetError<P::Error>> {
        let target = self
            .provider
            .describe_instance(instance_id)
            .await
            .map_err(FleetError::Provider)?;
        let request = VolumeRequest {
            name: format!("{snapshot_id}-restore"),
            snapshot_id: snapshot_id.to_owned(),
            zone: target.zone,
        };
        let volume = self
            .provider
            .create_volume(&request)
            .await
            .map_err(FleetError::Provider)?;
        tracing::info!(volume_id = %volume.id, snapshot_id, "volume requested");

        self.wait_for_volume(&volume.id, wait).await?;
        self.provider
            .attach_volume(&volume.id, instance_id, device)
            .await
            .map_err(FleetError::Provider)?;
        tracing::info!(volume_id = %volume.id, instance_id, device, "volume attached");
        Ok(volume)
    }

    async fn wait_for_snapshot(
        &self,
        snapshot_id: &str,
        wait: WaitSettings,
    ) -> Result<(), FleetError<P::Error>> {
        tracing::info!(snapshot_id, "waiting for snapshot");
        let resource = format!("snapshot {snapshot_id}");
        wait_until(&resource, wait, || async move {
            self.provider
                .snapshot_status(snapshot_id)
                .await
                .map(snapshot_readiness)
        })
        .await?;
        Ok(())
    }

    async fn wait_for_volume(
        &self,
        volume_id: &str,
        wait: WaitSettings,
    ) -> Result<(), FleetError<P::Error>> {
        tracing::info!(volume_id, "waiting for volume");
        let resource = format!("volume {volume_id}");
        wait_until(&resource, wait, || async move {
            self.provider
                .volume_status(volume_id)
                .await
                .map(volume_readiness)
        })
        .await?;
        Ok(())
    }
}
