//! Fleet operations over a [`Provider`].
//!
//! [`FleetManager`] is built once from a provider and the loaded
//! configuration. It looks the account id up at construction and then exposes
//! the read, lifecycle, and duplication workflows. Every operation runs its
//! remote calls one after another.

mod launch;
mod volumes;

use std::io::Write;
use std::time::Duration;

use thiserror::Error;

use crate::config::FleetConfig;
use crate::model::{DeviceMap, gigabyte_label};
use crate::provider::{Provider, RequestError};
use crate::table::{Cell, Table, TableError};
use crate::wait::{WaitError, WaitSettings};

pub use launch::LaunchOverrides;

/// Default polling applied while snapshots complete.
pub const SNAPSHOT_WAIT: WaitSettings =
    WaitSettings::new(Duration::from_secs(15), Duration::from_secs(3600));

/// Default polling applied while restored volumes become available.
pub const VOLUME_WAIT: WaitSettings =
    WaitSettings::new(Duration::from_secs(5), Duration::from_secs(600));

const INSTANCE_HEADERS: [&str; 7] = [
    "Instance ID",
    "Type",
    "Image ID",
    "Status",
    "IP Address",
    "Host",
    "Security Groups",
];
const SNAPSHOT_HEADERS: [&str; 5] = ["Snapshot ID", "Description", "Size", "Status", "Progress"];
const VOLUME_HEADERS: [&str; 4] = ["Device", "Volume ID", "Size", "Status"];

/// Errors surfaced by fleet operations.
#[derive(Debug, Error)]
pub enum FleetError<E>
where
    E: std::error::Error + 'static,
{
    /// A provider call failed.
    #[error("provider call failed: {0}")]
    Provider(#[source] E),
    /// Writing a table to its sink failed.
    #[error("failed to render table: {0}")]
    Render(#[from] TableError),
    /// A resource entered a failure state while being waited on.
    #[error("{resource} entered a failure state: {reason}")]
    Poll {
        /// Resource being waited on.
        resource: String,
        /// Reported state or reason.
        reason: String,
    },
    /// A resource did not become ready before the deadline.
    #[error("timed out after {waited:?} waiting for {resource}")]
    PollTimeout {
        /// Resource being waited on.
        resource: String,
        /// Configured timeout.
        waited: Duration,
    },
    /// Fewer than one instance was requested.
    #[error("instance count must be at least 1")]
    InvalidCount,
    /// A launch parameter resolved to an empty value.
    #[error("missing launch parameter: {field}")]
    MissingParameter {
        /// Name of the empty parameter.
        field: String,
    },
}

impl<E> From<WaitError<E>> for FleetError<E>
where
    E: std::error::Error + 'static,
{
    fn from(value: WaitError<E>) -> Self {
        match value {
            WaitError::Probe(err) => Self::Provider(err),
            WaitError::Failed { resource, reason } => Self::Poll { resource, reason },
            WaitError::Timeout { resource, waited } => Self::PollTimeout { resource, waited },
        }
    }
}

impl<E> From<RequestError> for FleetError<E>
where
    E: std::error::Error + 'static,
{
    fn from(value: RequestError) -> Self {
        match value {
            RequestError::InvalidCount => Self::InvalidCount,
            RequestError::Validation(field) => Self::MissingParameter { field },
        }
    }
}

/// Entry point for every fleet workflow.
#[derive(Debug)]
pub struct FleetManager<P> {
    provider: P,
    config: FleetConfig,
    account_id: String,
}

impl<P> FleetManager<P>
where
    P: Provider,
{
    /// Builds a manager and looks up the account id owning the credentials.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Provider`] when the account lookup fails.
    pub async fn connect(provider: P, config: FleetConfig) -> Result<Self, FleetError<P::Error>> {
        let account_id = provider
            .account_id()
            .await
            .map_err(FleetError::Provider)?;
        tracing::debug!(account_id = %account_id, "resolved account");
        Ok(Self {
            provider,
            config,
            account_id,
        })
    }

    /// Returns the wrapped provider.
    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns the account id resolved at construction.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Lists the region names reported by the provider.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Provider`] when the call fails.
    pub async fn list_regions(&self) -> Result<Vec<String>, FleetError<P::Error>> {
        self.provider
            .list_regions()
            .await
            .map_err(FleetError::Provider)
    }

    /// Builds the instance table from a single listing call.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Provider`] when the listing fails.
    pub async fn instances_table(&self) -> Result<Table, FleetError<P::Error>> {
        let instances = self
            .provider
            .list_instances()
            .await
            .map_err(FleetError::Provider)?;
        let mut table = Table::new(INSTANCE_HEADERS);
        for instance in instances {
            let groups = instance.security_group_names();
            table.push_row(vec![
                Cell::from(instance.id),
                Cell::from(instance.instance_type),
                Cell::from(instance.image_id),
                Cell::from(instance.status),
                Cell::from(instance.address),
                Cell::from(instance.hostname),
                Cell::from(groups),
            ]);
        }
        Ok(table)
    }

    /// Writes the instance table to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Provider`] when the listing fails and
    /// [`FleetError::Render`] when the sink rejects the output.
    pub async fn describe_instances<W>(&self, sink: &mut W) -> Result<(), FleetError<P::Error>>
    where
        W: Write + ?Sized,
    {
        let table = self.instances_table().await?;
        table.write_to(sink)?;
        Ok(())
    }

    /// Builds the table of snapshots owned by the account.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Provider`] when the listing fails.
    pub async fn snapshots_table(&self) -> Result<Table, FleetError<P::Error>> {
        let snapshots = self
            .provider
            .list_snapshots(&self.account_id)
            .await
            .map_err(FleetError::Provider)?;
        let mut table = Table::new(SNAPSHOT_HEADERS);
        for snapshot in snapshots {
            table.push_row(vec![
                Cell::from(snapshot.id),
                Cell::from(snapshot.description),
                Cell::from(gigabyte_label(snapshot.size_bytes)),
                Cell::from(snapshot.status),
                Cell::from(snapshot.progress),
            ]);
        }
        Ok(table)
    }

    /// Writes the snapshot table to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Provider`] when the listing fails and
    /// [`FleetError::Render`] when the sink rejects the output.
    pub async fn describe_snapshots<W>(&self, sink: &mut W) -> Result<(), FleetError<P::Error>>
    where
        W: Write + ?Sized,
    {
        let table = self.snapshots_table().await?;
        table.write_to(sink)?;
        Ok(())
    }

    /// Maps device paths to the volumes attached to `instance_id`.
    ///
    /// The provider's root device never appears in the result.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Provider`] when the listing fails.
    pub async fn get_instance_volumes(
        &self,
        instance_id: &str,
    ) -> Result<DeviceMap, FleetError<P::Error>> {
        let volumes = self
            .provider
            .list_volumes()
            .await
            .map_err(FleetError::Provider)?;
        let root = self.provider.root_device();
        let mut devices = DeviceMap::new();
        for volume in volumes {
            let device = volume
                .attachments
                .iter()
                .find(|attachment| attachment.instance_id == instance_id)
                .map(|attachment| attachment.device.clone());
            if let Some(path) = device.filter(|path| path != root) {
                devices.insert(path, volume);
            }
        }
        Ok(devices)
    }

    /// Writes the non-root volumes of `instance_id` to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Provider`] when the listing fails and
    /// [`FleetError::Render`] when the sink rejects the output.
    pub async fn describe_volumes<W>(
        &self,
        instance_id: &str,
        sink: &mut W,
    ) -> Result<(), FleetError<P::Error>>
    where
        W: Write + ?Sized,
    {
        let devices = self.get_instance_volumes(instance_id).await?;
        let mut table = Table::new(VOLUME_HEADERS);
        for (device, volume) in devices {
            table.push_row(vec![
                Cell::from(device),
                Cell::from(volume.id),
                Cell::from(gigabyte_label(volume.size_bytes)),
                Cell::from(volume.status),
            ]);
        }
        table.write_to(sink)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
