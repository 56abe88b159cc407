//! Server listing, creation, termination, and volume attachment.

use std::collections::BTreeMap;

use reqwest::{Method, StatusCode};
use uuid::Uuid;

use crate::provider::{InstanceHandle, LaunchRequest};

use super::http::{api_error, decode};
use super::types::{
    CreateServerRequest, KEY_TAG_PREFIX, LaunchVolume, ROOT_SLOT, Server, ServerAction,
    ServerEnvelope, ServerList, UpdateServerVolumes, VOLUME_TYPE_BLOCK, VolumeSlot,
};
use super::{ScalewayProvider, ScalewayProviderError};

const INSTANCE_TAG: &str = "flotilla";

impl ScalewayProvider {
    pub(super) async fn fetch_servers(&self) -> Result<Vec<Server>, ScalewayProviderError> {
        let url = self.instance_url("servers");
        self.fetch_all("list servers", &url, &[], |list: ServerList| list.servers)
            .await
    }

    pub(super) async fn fetch_server(
        &self,
        instance_id: &str,
    ) -> Result<Server, ScalewayProviderError> {
        let operation = "get server";
        let url = self.instance_url(&format!("servers/{instance_id}"));
        let (status, body) = self
            .send_raw(operation, self.request(Method::GET, &url))
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Err(ScalewayProviderError::InstanceNotFound {
                instance_id: instance_id.to_owned(),
                zone: self.config.default_zone.clone(),
            });
        }
        if !status.is_success() {
            return Err(api_error(operation, status, &body));
        }
        decode::<ServerEnvelope>(operation, &body).map(|envelope| envelope.server)
    }

    fn server_payload(&self, request: &LaunchRequest, project: &str) -> CreateServerRequest {
        let suffix = Uuid::new_v4().simple().to_string();
        let mut tags = vec![String::from(INSTANCE_TAG)];
        if let Some(key) = &request.key_name {
            tags.push(format!("{KEY_TAG_PREFIX}{key}"));
        }
        if request.security_groups.len() > 1 {
            tracing::warn!(
                groups = ?request.security_groups,
                "Scaleway servers accept a single security group; using the first"
            );
        }
        let volumes = request
            .block_devices
            .iter()
            .map(|mapping| {
                (
                    mapping.device.clone(),
                    LaunchVolume {
                        name: format!("flotilla-{suffix}-{}", mapping.device),
                        volume_type: String::from(VOLUME_TYPE_BLOCK),
                        base_snapshot: mapping.snapshot_id.clone(),
                    },
                )
            })
            .collect();

        CreateServerRequest {
            name: format!("flotilla-{suffix}"),
            commercial_type: request.instance_type.clone(),
            image: request.image_id.clone(),
            project: project.to_owned(),
            dynamic_ip_required: true,
            tags,
            security_group: request.security_groups.first().cloned(),
            volumes,
        }
    }

    /// Creates one server per requested instance in the request's zone and
    /// powers each on.
    ///
    /// Scaleway has no batch create, so a failure part way through leaves the
    /// servers created so far in place.
    pub(super) async fn create_servers(
        &self,
        request: &LaunchRequest,
    ) -> Result<Vec<InstanceHandle>, ScalewayProviderError> {
        request.validate()?;
        let project = self.project_id().await?;
        let url = self.zone_url(&request.zone, "servers");
        let mut handles = Vec::new();
        for _ in 0..request.count {
            let payload = self.server_payload(request, &project);
            let created: ServerEnvelope = self
                .send_json(
                    "create server",
                    self.request(Method::POST, &url).json(&payload),
                )
                .await?;
            self.perform_action(&request.zone, &created.server.id, "poweron")
                .await?;
            tracing::info!(instance_id = %created.server.id, "instance launched");
            handles.push(InstanceHandle {
                id: created.server.id,
                zone: request.zone.clone(),
            });
        }
        Ok(handles)
    }

    pub(super) async fn perform_action(
        &self,
        zone: &str,
        instance_id: &str,
        action: &str,
    ) -> Result<(), ScalewayProviderError> {
        let url = self.zone_url(zone, &format!("servers/{instance_id}/action"));
        self.send_checked(
            "server action",
            self.request(Method::POST, &url).json(&ServerAction { action }),
        )
        .await?;
        Ok(())
    }

    /// Adds `volume_id` to the server's volume map at slot `device`.
    ///
    /// The PATCH replaces the whole map, so every existing slot is sent back
    /// unchanged alongside the new one.
    pub(super) async fn attach_to_server(
        &self,
        volume_id: &str,
        instance_id: &str,
        device: &str,
    ) -> Result<(), ScalewayProviderError> {
        let invalid = |reason: &str| ScalewayProviderError::InvalidDevice {
            device: device.to_owned(),
            instance_id: instance_id.to_owned(),
            reason: reason.to_owned(),
        };
        if device.parse::<u8>().is_err() {
            return Err(invalid("Scaleway devices are numeric volume slots"));
        }
        if device == ROOT_SLOT {
            return Err(invalid("slot 0 holds the root volume"));
        }

        let server = self.fetch_server(instance_id).await?;
        if server.volumes.contains_key(device) {
            return Err(invalid("slot already in use"));
        }

        let mut volumes: BTreeMap<String, VolumeSlot> = server
            .volumes
            .into_iter()
            .map(|(slot, volume)| {
                let boot = slot == ROOT_SLOT;
                (slot, VolumeSlot { id: volume.id, boot })
            })
            .collect();
        volumes.insert(
            device.to_owned(),
            VolumeSlot {
                id: volume_id.to_owned(),
                boot: false,
            },
        );

        let url = self.instance_url(&format!("servers/{instance_id}"));
        let payload = UpdateServerVolumes { volumes };
        self.send_checked(
            "attach volume",
            self.request(Method::PATCH, &url).json(&payload),
        )
        .await?;
        Ok(())
    }
}
