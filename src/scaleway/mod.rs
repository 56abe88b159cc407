//! Scaleway implementation of the [`Provider`] capability interface.
//!
//! Calls go straight to the Instances and IAM APIs over HTTPS with
//! `reqwest`, since they need server volume maps and tags that the
//! `scaleway-rs` models do not carry. `scaleway-rs` supplies the zone
//! catalogue. Calls are scoped to the configured zone unless a request
//! names its own.

mod error;
mod http;
mod servers;
mod storage;
mod types;

use std::sync::OnceLock;

use reqwest::Method;
use scaleway_rs::ScalewayApi;

use crate::config::FleetConfig;
use crate::model::{Instance, Snapshot, SnapshotStatus, Volume, VolumeStatus};
use crate::provider::{
    InstanceHandle, LaunchRequest, Provider, ProviderFuture, SnapshotHandle, VolumeHandle,
    VolumeRequest,
};
use types::{ApiKey, ROOT_SLOT};

pub use error::ScalewayProviderError;

/// Zones the provider can reach, grouped by region in catalogue order.
#[must_use]
pub fn zone_catalogue() -> Vec<&'static str> {
    ScalewayApi::az_list()
}

/// Provider backed by the Scaleway Instances API.
#[derive(Clone, Debug)]
pub struct ScalewayProvider {
    http: reqwest::Client,
    config: FleetConfig,
    api_base: String,
    project: OnceLock<String>,
}

impl ScalewayProvider {
    /// Constructs a provider from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScalewayProviderError::Config`] when the configuration fails
    /// validation and [`ScalewayProviderError::Provider`] when the HTTP client
    /// cannot be built.
    pub fn new(config: FleetConfig) -> Result<Self, ScalewayProviderError> {
        config.validate()?;
        Ok(Self {
            http: http::http_client()?,
            config,
            api_base: String::from(http::SCALEWAY_API_BASE),
            project: OnceLock::new(),
        })
    }

    /// Points direct HTTP calls at another endpoint, such as a local mock.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    /// Returns the zone every call is scoped to.
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.config.default_zone
    }

    /// Resolves the project owning the API key, once per provider.
    async fn project_id(&self) -> Result<String, ScalewayProviderError> {
        if let Some(project) = self.project.get() {
            return Ok(project.clone());
        }
        let Some(access_key) = self
            .config
            .access_key_id
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
        else {
            return Err(ScalewayProviderError::Config(String::from(
                "an access key is required to resolve the owning project: set FLOTILLA_ACCESS_KEY_ID or add access_key_id to flotilla.toml",
            )));
        };

        let url = self.iam_url(&format!("api-keys/{access_key}"));
        let key: ApiKey = self
            .send_json("get api key", self.request(Method::GET, &url))
            .await?;
        Ok(self.project.get_or_init(|| key.default_project_id).clone())
    }
}

/// Derives region names from the zone catalogue, keeping first-seen order.
fn catalogue_regions() -> Vec<String> {
    let mut regions: Vec<String> = Vec::new();
    for zone in zone_catalogue() {
        let region = zone
            .rsplit_once('-')
            .map_or(zone, |(region, _)| region)
            .to_owned();
        if !regions.contains(&region) {
            regions.push(region);
        }
    }
    regions
}

impl Provider for ScalewayProvider {
    type Error = ScalewayProviderError;

    fn root_device(&self) -> &str {
        ROOT_SLOT
    }

    fn list_regions(&self) -> ProviderFuture<'_, Vec<String>, Self::Error> {
        Box::pin(async move { Ok(catalogue_regions()) })
    }

    fn account_id(&self) -> ProviderFuture<'_, String, Self::Error> {
        Box::pin(async move { self.project_id().await })
    }

    fn list_instances(&self) -> ProviderFuture<'_, Vec<Instance>, Self::Error> {
        Box::pin(async move {
            let servers = self.fetch_servers().await?;
            Ok(servers.into_iter().map(Instance::from).collect())
        })
    }

    fn describe_instance<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> ProviderFuture<'a, Instance, Self::Error> {
        Box::pin(async move { self.fetch_server(instance_id).await.map(Instance::from) })
    }

    fn create_instances<'a>(
        &'a self,
        request: &'a LaunchRequest,
    ) -> ProviderFuture<'a, Vec<InstanceHandle>, Self::Error> {
        Box::pin(async move { self.create_servers(request).await })
    }

    fn terminate_instance<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.perform_action(&self.config.default_zone, instance_id, "terminate")
                .await
        })
    }

    fn list_volumes(&self) -> ProviderFuture<'_, Vec<Volume>, Self::Error> {
        Box::pin(async move { self.fetch_volumes().await })
    }

    fn create_volume<'a>(
        &'a self,
        request: &'a VolumeRequest,
    ) -> ProviderFuture<'a, VolumeHandle, Self::Error> {
        Box::pin(async move { self.create_volume_from_snapshot(request).await })
    }

    fn attach_volume<'a>(
        &'a self,
        volume_id: &'a str,
        instance_id: &'a str,
        device: &'a str,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move { self.attach_to_server(volume_id, instance_id, device).await })
    }

    fn create_snapshot<'a>(
        &'a self,
        volume_id: &'a str,
        description: &'a str,
    ) -> ProviderFuture<'a, SnapshotHandle, Self::Error> {
        Box::pin(async move { self.request_snapshot(volume_id, description).await })
    }

    fn list_snapshots<'a>(
        &'a self,
        owner_id: &'a str,
    ) -> ProviderFuture<'a, Vec<Snapshot>, Self::Error> {
        Box::pin(async move { self.fetch_snapshots(owner_id).await })
    }

    fn snapshot_status<'a>(
        &'a self,
        snapshot_id: &'a str,
    ) -> ProviderFuture<'a, SnapshotStatus, Self::Error> {
        Box::pin(async move { self.fetch_snapshot_status(snapshot_id).await })
    }

    fn volume_status<'a>(
        &'a self,
        volume_id: &'a str,
    ) -> ProviderFuture<'a, VolumeStatus, Self::Error> {
        Box::pin(async move { self.fetch_volume_status(volume_id).await })
    }
}
