//! Wire types for the Scaleway Instances and IAM APIs and their conversion
//! into provider-neutral models.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{
    Attachment, Instance, InstanceStatus, SecurityGroup, Snapshot, SnapshotStatus, Volume,
    VolumeStatus,
};

/// Slot holding the boot volume in a server's volume map.
pub(crate) const ROOT_SLOT: &str = "0";

/// Tag prefix carrying the key-pair name; Scaleway keys are project-wide.
pub(crate) const KEY_TAG_PREFIX: &str = "key=";

/// Volume type used for volumes restored from snapshots.
pub(crate) const VOLUME_TYPE_BLOCK: &str = "b_ssd";

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ServerList {
    pub(crate) servers: Vec<Server>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ServerEnvelope {
    pub(crate) server: Server,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Server {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) commercial_type: String,
    #[serde(default)]
    pub(crate) hostname: String,
    #[serde(default)]
    pub(crate) image: Option<IdRef>,
    pub(crate) state: String,
    #[serde(default)]
    pub(crate) public_ip: Option<PublicIp>,
    #[serde(default)]
    pub(crate) security_group: Option<NamedRef>,
    #[serde(default)]
    pub(crate) volumes: BTreeMap<String, IdRef>,
    #[serde(default)]
    pub(crate) zone: String,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct IdRef {
    pub(crate) id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct NamedRef {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct PublicIp {
    pub(crate) address: String,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct VolumeList {
    pub(crate) volumes: Vec<ScwVolume>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct VolumeEnvelope {
    pub(crate) volume: ScwVolume,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ScwVolume {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) size: u64,
    pub(crate) state: String,
    #[serde(default)]
    pub(crate) zone: String,
    #[serde(default)]
    pub(crate) server: Option<IdRef>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct SnapshotList {
    pub(crate) snapshots: Vec<ScwSnapshot>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct SnapshotEnvelope {
    pub(crate) snapshot: ScwSnapshot,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ScwSnapshot {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) size: u64,
    pub(crate) state: String,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ApiKey {
    pub(crate) default_project_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct CreateServerRequest {
    pub(crate) name: String,
    pub(crate) commercial_type: String,
    pub(crate) image: String,
    pub(crate) project: String,
    pub(crate) dynamic_ip_required: bool,
    pub(crate) tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) security_group: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) volumes: BTreeMap<String, LaunchVolume>,
}

/// Volume created from a snapshot while the server is created.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct LaunchVolume {
    pub(crate) name: String,
    pub(crate) volume_type: String,
    pub(crate) base_snapshot: String,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct CreateVolumeRequest {
    pub(crate) name: String,
    pub(crate) project: String,
    pub(crate) volume_type: String,
    pub(crate) base_snapshot: String,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct CreateSnapshotRequest {
    pub(crate) name: String,
    pub(crate) volume_id: String,
    pub(crate) project: String,
}

/// Volume reference for attachment in the Scaleway API.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct VolumeSlot {
    pub(crate) id: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub(crate) boot: bool,
}

/// Request body for `PATCH /servers/{id}`; the map is keyed by slot index.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct UpdateServerVolumes {
    pub(crate) volumes: BTreeMap<String, VolumeSlot>,
}

/// Request body for `POST /servers/{id}/action`.
#[derive(Clone, Copy, Debug, Serialize)]
pub(crate) struct ServerAction<'a> {
    pub(crate) action: &'a str,
}

pub(crate) fn instance_status(state: &str) -> InstanceStatus {
    match state {
        "starting" => InstanceStatus::Pending,
        "running" => InstanceStatus::Running,
        "stopping" => InstanceStatus::Stopping,
        "stopped" | "stopped in place" => InstanceStatus::Stopped,
        other => InstanceStatus::Other(other.to_owned()),
    }
}

pub(crate) fn volume_status(state: &str, attached: bool) -> VolumeStatus {
    match state {
        "available" if attached => VolumeStatus::InUse,
        "available" => VolumeStatus::Available,
        "fetching" | "hotsyncing" => VolumeStatus::Pending,
        "error" => VolumeStatus::Error,
        other => VolumeStatus::Other(other.to_owned()),
    }
}

pub(crate) fn snapshot_status(state: &str) -> SnapshotStatus {
    match state {
        "available" => SnapshotStatus::Completed,
        "snapshotting" | "importing" | "exporting" => SnapshotStatus::Pending,
        "error" | "invalid_data" => SnapshotStatus::Error,
        other => SnapshotStatus::Other(other.to_owned()),
    }
}

impl Server {
    pub(crate) fn key_name(&self) -> Option<String> {
        self.tags
            .iter()
            .find_map(|tag| tag.strip_prefix(KEY_TAG_PREFIX))
            .map(str::to_owned)
    }
}

impl From<Server> for Instance {
    fn from(server: Server) -> Self {
        let key_name = server.key_name();
        Self {
            status: instance_status(&server.state),
            image_id: server.image.map(|image| image.id).unwrap_or_default(),
            address: server.public_ip.map(|ip| ip.address),
            security_groups: server
                .security_group
                .into_iter()
                .map(|group| SecurityGroup {
                    id: group.id,
                    name: group.name,
                })
                .collect(),
            id: server.id,
            instance_type: server.commercial_type,
            hostname: server.hostname,
            zone: server.zone,
            key_name,
        }
    }
}

impl From<ScwSnapshot> for Snapshot {
    fn from(snapshot: ScwSnapshot) -> Self {
        let status = snapshot_status(&snapshot.state);
        let progress = (status == SnapshotStatus::Completed).then_some(100);
        Self {
            id: snapshot.id,
            description: snapshot.name,
            size_bytes: snapshot.size,
            status,
            progress,
        }
    }
}

/// Joins the volume listing with the servers' slot maps to recover the
/// device each volume is attached at.
pub(crate) fn volumes_with_attachments(volumes: Vec<ScwVolume>, servers: &[Server]) -> Vec<Volume> {
    let mut attachments: HashMap<&str, Vec<Attachment>> = HashMap::new();
    for server in servers {
        for (slot, volume) in &server.volumes {
            attachments
                .entry(volume.id.as_str())
                .or_default()
                .push(Attachment {
                    device: slot.clone(),
                    instance_id: server.id.clone(),
                });
        }
    }

    volumes
        .into_iter()
        .map(|volume| {
            let found = attachments.remove(volume.id.as_str()).unwrap_or_default();
            let attached = volume.server.is_some() || !found.is_empty();
            Volume {
                status: volume_status(&volume.state, attached),
                id: volume.id,
                size_bytes: volume.size,
                zone: volume.zone,
                attachments: found,
            }
        })
        .collect()
}
