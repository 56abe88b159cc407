//! Provider-neutral views of instances, volumes, and snapshots.
//!
//! Every value here is a snapshot of remote state taken during a single call.
//! Nothing is cached between calls; the provider owns the lifecycle.

use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state reported for an instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstanceStatus {
    /// The instance is being provisioned or booted.
    Pending,
    /// The instance is running.
    Running,
    /// The instance is shutting down.
    Stopping,
    /// The instance is stopped but still allocated.
    Stopped,
    /// The instance has been terminated.
    Terminated,
    /// Any other provider-specific state, kept verbatim.
    Other(String),
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Running => f.write_str("running"),
            Self::Stopping => f.write_str("stopping"),
            Self::Stopped => f.write_str("stopped"),
            Self::Terminated => f.write_str("terminated"),
            Self::Other(state) => f.write_str(state),
        }
    }
}

/// Lifecycle state reported for a volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VolumeStatus {
    /// The volume is ready to be attached.
    Available,
    /// The volume is attached to an instance.
    InUse,
    /// The volume is still being created or restored.
    Pending,
    /// The provider gave up on the volume.
    Error,
    /// Any other provider-specific state, kept verbatim.
    Other(String),
}

impl fmt::Display for VolumeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => f.write_str("available"),
            Self::InUse => f.write_str("in-use"),
            Self::Pending => f.write_str("pending"),
            Self::Error => f.write_str("error"),
            Self::Other(state) => f.write_str(state),
        }
    }
}

/// Lifecycle state reported for a snapshot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SnapshotStatus {
    /// The snapshot is still being taken.
    Pending,
    /// The snapshot is complete and usable.
    Completed,
    /// The provider failed to take the snapshot.
    Error,
    /// Any other provider-specific state, kept verbatim.
    Other(String),
}

impl fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Completed => f.write_str("completed"),
            Self::Error => f.write_str("error"),
            Self::Other(state) => f.write_str(state),
        }
    }
}

/// Security group reference carried by an instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SecurityGroup {
    /// Provider identifier used when launching instances.
    pub id: String,
    /// Human-readable name used for display.
    pub name: String,
}

/// A virtual machine as reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instance {
    /// Provider-assigned identifier.
    pub id: String,
    /// Machine type (commercial type on Scaleway).
    pub instance_type: String,
    /// Identifier of the boot image.
    pub image_id: String,
    /// Lifecycle status.
    pub status: InstanceStatus,
    /// Public network address, when one is assigned.
    pub address: Option<String>,
    /// Hostname reported by the provider.
    pub hostname: String,
    /// Security groups applied to the instance.
    pub security_groups: Vec<SecurityGroup>,
    /// Availability zone hosting the instance.
    pub zone: String,
    /// Key-pair name recorded for the instance.
    pub key_name: Option<String>,
}

impl Instance {
    /// Returns the security group names joined by single spaces.
    #[must_use]
    pub fn security_group_names(&self) -> String {
        self.security_groups
            .iter()
            .map(|group| group.name.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Association of a volume with an instance at a device path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attachment {
    /// Device path (or slot) the volume is exposed at.
    pub device: String,
    /// Instance the volume is attached to.
    pub instance_id: String,
}

/// A block storage volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Volume {
    /// Provider-assigned identifier.
    pub id: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Lifecycle status.
    pub status: VolumeStatus,
    /// Availability zone of the volume.
    pub zone: String,
    /// Current attachments; at most one per instance.
    pub attachments: Vec<Attachment>,
}

/// A point-in-time copy of a volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Snapshot {
    /// Provider-assigned identifier.
    pub id: String,
    /// Free-form description (the snapshot name on Scaleway).
    pub description: String,
    /// Size of the source volume in bytes.
    pub size_bytes: u64,
    /// Lifecycle status.
    pub status: SnapshotStatus,
    /// Completion percentage when the provider reports one.
    pub progress: Option<u8>,
}

/// Device path to volume mapping for a single instance.
pub type DeviceMap = BTreeMap<String, Volume>;

const BYTES_PER_GB: u64 = 1_000_000_000;

/// Formats a byte count as whole gigabytes with a `G` suffix, rounding up.
#[must_use]
pub fn gigabyte_label(size_bytes: u64) -> String {
    format!("{}G", size_bytes.div_ceil(BYTES_PER_GB))
}
