//! Core library for the Flotilla fleet helper.
//!
//! The crate exposes a provider abstraction over cloud instances, volumes,
//! and snapshots, a Scaleway implementation of it, and a [`FleetManager`]
//! that runs the inspection, launch, and duplication workflows. Results are
//! printed with the aligned console tables in [`table`].

pub mod config;
pub mod fleet;
pub mod model;
pub mod provider;
pub mod scaleway;
pub mod table;
pub mod test_support;
pub mod wait;

pub use config::{ConfigError, FleetConfig};
pub use fleet::{FleetError, FleetManager, LaunchOverrides, SNAPSHOT_WAIT, VOLUME_WAIT};
pub use model::{
    Attachment, DeviceMap, Instance, InstanceStatus, SecurityGroup, Snapshot, SnapshotStatus,
    Volume, VolumeStatus,
};
pub use provider::{
    BlockDeviceMapping, InstanceHandle, LaunchRequest, LaunchRequestBuilder, Provider,
    ProviderFuture, RequestError, SnapshotHandle, VolumeHandle, VolumeRequest,
};
pub use scaleway::{ScalewayProvider, ScalewayProviderError};
pub use table::{Cell, Table, TableError};
pub use wait::{Readiness, WaitError, WaitSettings, wait_until};
