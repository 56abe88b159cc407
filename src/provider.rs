//! Capability interface over a remote compute provider.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::model::{Instance, Snapshot, SnapshotStatus, Volume, VolumeStatus};

/// Volume to create from a snapshot when an instance launches.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockDeviceMapping {
    /// Device path (or slot) the restored volume is exposed at.
    pub device: String,
    /// Snapshot the new volume is created from.
    pub snapshot_id: String,
}

/// Parameters required to launch one or more instances.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchRequest {
    /// Boot image identifier.
    pub image_id: String,
    /// Machine type to request.
    pub instance_type: String,
    /// Target availability zone.
    pub zone: String,
    /// Key-pair name to record on the instances.
    pub key_name: Option<String>,
    /// Security group identifiers to apply.
    pub security_groups: Vec<String>,
    /// Number of identical instances to launch.
    pub count: u32,
    /// Volumes restored from snapshots at launch.
    pub block_devices: Vec<BlockDeviceMapping>,
}

impl LaunchRequest {
    /// Starts a builder for a [`LaunchRequest`].
    #[must_use]
    pub fn builder() -> LaunchRequestBuilder {
        LaunchRequestBuilder::new()
    }

    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when a required field is empty and
    /// [`RequestError::InvalidCount`] when `count` is zero.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.image_id.is_empty() {
            return Err(RequestError::Validation("image_id".to_owned()));
        }
        if self.instance_type.is_empty() {
            return Err(RequestError::Validation("instance_type".to_owned()));
        }
        if self.zone.is_empty() {
            return Err(RequestError::Validation("zone".to_owned()));
        }
        if self.count == 0 {
            return Err(RequestError::InvalidCount);
        }
        Ok(())
    }
}

/// Builder for [`LaunchRequest`] that trims inputs and validates on build.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchRequestBuilder {
    image_id: String,
    instance_type: String,
    zone: String,
    key_name: Option<String>,
    security_groups: Vec<String>,
    count: u32,
    block_devices: Vec<BlockDeviceMapping>,
}

impl Default for LaunchRequestBuilder {
    fn default() -> Self {
        Self {
            image_id: String::new(),
            instance_type: String::new(),
            zone: String::new(),
            key_name: None,
            security_groups: Vec::new(),
            count: 1,
            block_devices: Vec::new(),
        }
    }
}

impl LaunchRequestBuilder {
    /// Creates a builder launching a single instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the image identifier.
    #[must_use]
    pub fn image_id(mut self, value: impl Into<String>) -> Self {
        self.image_id = value.into();
        self
    }

    /// Sets the machine type.
    #[must_use]
    pub fn instance_type(mut self, value: impl Into<String>) -> Self {
        self.instance_type = value.into();
        self
    }

    /// Sets the availability zone.
    #[must_use]
    pub fn zone(mut self, value: impl Into<String>) -> Self {
        self.zone = value.into();
        self
    }

    /// Sets the optional key-pair name.
    #[must_use]
    pub fn key_name(mut self, value: Option<String>) -> Self {
        self.key_name = value;
        self
    }

    /// Sets the security group identifiers.
    #[must_use]
    pub fn security_groups(mut self, value: Vec<String>) -> Self {
        self.security_groups = value;
        self
    }

    /// Sets how many instances to launch.
    #[must_use]
    pub const fn count(mut self, value: u32) -> Self {
        self.count = value;
        self
    }

    /// Sets the volumes to restore from snapshots at launch.
    #[must_use]
    pub fn block_devices(mut self, value: Vec<BlockDeviceMapping>) -> Self {
        self.block_devices = value;
        self
    }

    /// Builds and validates the [`LaunchRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when a required field is empty or the count
    /// is zero.
    pub fn build(self) -> Result<LaunchRequest, RequestError> {
        let request = LaunchRequest {
            image_id: self.image_id.trim().to_owned(),
            instance_type: self.instance_type.trim().to_owned(),
            zone: self.zone.trim().to_owned(),
            key_name: self
                .key_name
                .map(|key| key.trim().to_owned())
                .filter(|key| !key.is_empty()),
            security_groups: self
                .security_groups
                .into_iter()
                .map(|group| group.trim().to_owned())
                .filter(|group| !group.is_empty())
                .collect(),
            count: self.count,
            block_devices: self.block_devices,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Parameters for restoring a volume from a snapshot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeRequest {
    /// Human-friendly volume name.
    pub name: String,
    /// Snapshot the volume is created from.
    pub snapshot_id: String,
    /// Zone the volume must live in.
    pub zone: String,
}

/// Handle returned once an instance has been requested.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceHandle {
    /// Provider identifier for the instance.
    pub id: String,
    /// Zone in which the instance was created.
    pub zone: String,
}

/// Handle returned after creating a volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeHandle {
    /// Provider identifier for the volume.
    pub id: String,
    /// Zone where the volume was created.
    pub zone: String,
}

/// Handle returned after requesting a snapshot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotHandle {
    /// Provider identifier for the snapshot.
    pub id: String,
    /// Volume the snapshot was taken from.
    pub volume_id: String,
}

/// Errors raised while assembling provider requests.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// Raised when a request is missing a required field.
    #[error("missing or empty field: {0}")]
    Validation(String),
    /// Raised when fewer than one instance is requested.
    #[error("instance count must be at least 1")]
    InvalidCount,
}

/// Future returned by provider operations.
pub type ProviderFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Remote operations consumed by the fleet manager.
///
/// Implementations issue exactly one logical remote query per call; list
/// operations return every matching resource in one batch.
pub trait Provider {
    /// Provider specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Device path reserved for the root volume of every instance.
    fn root_device(&self) -> &str;

    /// Lists the region names the provider reports, in provider order.
    fn list_regions(&self) -> ProviderFuture<'_, Vec<String>, Self::Error>;

    /// Looks up the identifier of the account owning the credentials.
    fn account_id(&self) -> ProviderFuture<'_, String, Self::Error>;

    /// Lists every instance visible to the account.
    fn list_instances(&self) -> ProviderFuture<'_, Vec<Instance>, Self::Error>;

    /// Fetches a single instance.
    fn describe_instance<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> ProviderFuture<'a, Instance, Self::Error>;

    /// Launches `request.count` instances.
    fn create_instances<'a>(
        &'a self,
        request: &'a LaunchRequest,
    ) -> ProviderFuture<'a, Vec<InstanceHandle>, Self::Error>;

    /// Requests termination without waiting for the terminal state.
    fn terminate_instance<'a>(&'a self, instance_id: &'a str)
    -> ProviderFuture<'a, (), Self::Error>;

    /// Lists every volume, including attachment information.
    fn list_volumes(&self) -> ProviderFuture<'_, Vec<Volume>, Self::Error>;

    /// Creates a volume from a snapshot.
    fn create_volume<'a>(
        &'a self,
        request: &'a VolumeRequest,
    ) -> ProviderFuture<'a, VolumeHandle, Self::Error>;

    /// Attaches a volume to an instance at the given device path.
    fn attach_volume<'a>(
        &'a self,
        volume_id: &'a str,
        instance_id: &'a str,
        device: &'a str,
    ) -> ProviderFuture<'a, (), Self::Error>;

    /// Requests a snapshot of a volume.
    fn create_snapshot<'a>(
        &'a self,
        volume_id: &'a str,
        description: &'a str,
    ) -> ProviderFuture<'a, SnapshotHandle, Self::Error>;

    /// Lists snapshots owned by the given account.
    fn list_snapshots<'a>(
        &'a self,
        owner_id: &'a str,
    ) -> ProviderFuture<'a, Vec<Snapshot>, Self::Error>;

    /// Reports the current status of a snapshot.
    fn snapshot_status<'a>(
        &'a self,
        snapshot_id: &'a str,
    ) -> ProviderFuture<'a, SnapshotStatus, Self::Error>;

    /// Reports the current status of a volume.
    fn volume_status<'a>(
        &'a self,
        volume_id: &'a str,
    ) -> ProviderFuture<'a, VolumeStatus, Self::Error>;
}
