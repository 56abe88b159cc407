//! Volume and snapshot endpoints.

use reqwest::Method;
use uuid::Uuid;

use crate::model::{Snapshot, SnapshotStatus, Volume, VolumeStatus};
use crate::provider::{SnapshotHandle, VolumeHandle, VolumeRequest};

use super::types::{
    CreateSnapshotRequest, CreateVolumeRequest, SnapshotEnvelope, SnapshotList,
    VOLUME_TYPE_BLOCK, VolumeEnvelope, VolumeList, snapshot_status, volume_status,
    volumes_with_attachments,
};
use super::{ScalewayProvider, ScalewayProviderError};

impl ScalewayProvider {
    pub(super) async fn fetch_volumes(&self) -> Result<Vec<Volume>, ScalewayProviderError> {
        let url = self.instance_url("volumes");
        let volumes = self
            .fetch_all("list volumes", &url, &[], |list: VolumeList| list.volumes)
            .await?;
        let servers = self.fetch_servers().await?;
        Ok(volumes_with_attachments(volumes, &servers))
    }

    pub(super) async fn create_volume_from_snapshot(
        &self,
        request: &VolumeRequest,
    ) -> Result<VolumeHandle, ScalewayProviderError> {
        let project = self.project_id().await?;
        let payload = CreateVolumeRequest {
            name: request.name.clone(),
            project,
            volume_type: String::from(VOLUME_TYPE_BLOCK),
            base_snapshot: request.snapshot_id.clone(),
        };
        let url = self.zone_url(&request.zone, "volumes");
        let created: VolumeEnvelope = self
            .send_json(
                "create volume",
                self.request(Method::POST, &url).json(&payload),
            )
            .await?;
        Ok(VolumeHandle {
            id: created.volume.id,
            zone: request.zone.clone(),
        })
    }

    pub(super) async fn fetch_volume_status(
        &self,
        volume_id: &str,
    ) -> Result<VolumeStatus, ScalewayProviderError> {
        let url = self.instance_url(&format!("volumes/{volume_id}"));
        let envelope: VolumeEnvelope = self
            .send_json("get volume", self.request(Method::GET, &url))
            .await?;
        let attached = envelope.volume.server.is_some();
        Ok(volume_status(&envelope.volume.state, attached))
    }

    pub(super) async fn request_snapshot(
        &self,
        volume_id: &str,
        description: &str,
    ) -> Result<SnapshotHandle, ScalewayProviderError> {
        let project = self.project_id().await?;
        let name = if description.trim().is_empty() {
            format!("flotilla-{}", Uuid::new_v4().simple())
        } else {
            description.trim().to_owned()
        };
        let payload = CreateSnapshotRequest {
            name,
            volume_id: volume_id.to_owned(),
            project,
        };
        let url = self.instance_url("snapshots");
        let created: SnapshotEnvelope = self
            .send_json(
                "create snapshot",
                self.request(Method::POST, &url).json(&payload),
            )
            .await?;
        Ok(SnapshotHandle {
            id: created.snapshot.id,
            volume_id: volume_id.to_owned(),
        })
    }

    pub(super) async fn fetch_snapshots(
        &self,
        owner_id: &str,
    ) -> Result<Vec<Snapshot>, ScalewayProviderError> {
        let url = self.instance_url("snapshots");
        let snapshots = self
            .fetch_all(
                "list snapshots",
                &url,
                &[("project", owner_id)],
                |list: SnapshotList| list.snapshots,
            )
            .await?;
        Ok(snapshots.into_iter().map(Snapshot::from).collect())
    }

    pub(super) async fn fetch_snapshot_status(
        &self,
        snapshot_id: &str,
    ) -> Result<SnapshotStatus, ScalewayProviderError> {
        let url = self.instance_url(&format!("snapshots/{snapshot_id}"));
        let envelope: SnapshotEnvelope = self
            .send_json("get snapshot", self.request(Method::GET, &url))
            .await?;
        Ok(snapshot_status(&envelope.snapshot.state))
    }
}
