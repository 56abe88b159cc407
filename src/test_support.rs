//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::model::{
    Attachment, Instance, InstanceStatus, SecurityGroup, Snapshot, SnapshotStatus, Volume,
    VolumeStatus,
};
use crate::provider::{
    InstanceHandle, LaunchRequest, Provider, ProviderFuture, SnapshotHandle, VolumeHandle,
    VolumeRequest,
};

/// Root device reported by [`FakeProvider`].
pub const FAKE_ROOT_DEVICE: &str = "/dev/sda1";

/// Errors returned by [`FakeProvider`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FakeProviderError {
    /// The requested resource is not seeded.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Resource kind.
        kind: &'static str,
        /// Resource identifier.
        id: String,
    },
    /// A failure scripted with [`FakeProvider::fail_operation`].
    #[error("simulated failure in {0}")]
    Injected(String),
}

/// A snapshot request recorded by [`FakeProvider`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotRequest {
    /// Volume that was snapshotted.
    pub volume_id: String,
    /// Description passed with the request.
    pub description: String,
}

/// An attach call recorded by [`FakeProvider`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttachCall {
    /// Volume attached.
    pub volume_id: String,
    /// Instance the volume was attached to.
    pub instance_id: String,
    /// Device path requested.
    pub device: String,
}

#[derive(Debug, Default)]
struct FakeState {
    account_id: String,
    regions: Vec<String>,
    instances: Vec<Instance>,
    volumes: Vec<Volume>,
    snapshots: Vec<Snapshot>,
    snapshot_statuses: VecDeque<SnapshotStatus>,
    volume_statuses: VecDeque<VolumeStatus>,
    failing: BTreeSet<String>,
    next_id: u32,
    calls: Vec<String>,
    launches: Vec<LaunchRequest>,
    volume_requests: Vec<VolumeRequest>,
    snapshot_requests: Vec<SnapshotRequest>,
    snapshot_owners: Vec<String>,
    attachments: Vec<AttachCall>,
    terminated: Vec<String>,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-fake-{}", self.next_id)
    }
}

/// In-memory [`Provider`] with seeded resources and scripted statuses.
///
/// Clones share state, so a test can keep a handle for assertions after
/// moving the provider into a [`crate::FleetManager`]. Status queries pop
/// scripted values in FIFO order; once a queue is empty snapshots report
/// `Completed` and volumes report `Available`.
#[derive(Clone, Debug)]
pub struct FakeProvider {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProvider {
    /// Creates an empty provider owned by account `acct-fake`.
    #[must_use]
    pub fn new() -> Self {
        let state = FakeState {
            account_id: String::from("acct-fake"),
            regions: vec![String::from("fr-par"), String::from("nl-ams")],
            ..FakeState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Creates a provider seeded with one instance carrying a data volume
    /// and one completed snapshot.
    #[must_use]
    pub fn demo() -> Self {
        let provider = Self::new();
        provider.add_instance(sample_instance("i-1"));
        provider.add_volume(attached_volume(
            "vol-root",
            "i-1",
            FAKE_ROOT_DEVICE,
            10_000_000_000,
        ));
        provider.add_volume(attached_volume("vol-data", "i-1", "/dev/sdf", 50_000_000_000));
        provider.add_snapshot(Snapshot {
            id: String::from("snap-1"),
            description: String::from("nightly"),
            size_bytes: 50_000_000_000,
            status: SnapshotStatus::Completed,
            progress: Some(100),
        });
        provider
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds an instance.
    pub fn add_instance(&self, instance: Instance) {
        self.lock().instances.push(instance);
    }

    /// Seeds a volume.
    pub fn add_volume(&self, volume: Volume) {
        self.lock().volumes.push(volume);
    }

    /// Seeds a snapshot.
    pub fn add_snapshot(&self, snapshot: Snapshot) {
        self.lock().snapshots.push(snapshot);
    }

    /// Queues the next status reported for any snapshot.
    pub fn push_snapshot_status(&self, status: SnapshotStatus) {
        self.lock().snapshot_statuses.push_back(status);
    }

    /// Queues the next status reported for any volume.
    pub fn push_volume_status(&self, status: VolumeStatus) {
        self.lock().volume_statuses.push_back(status);
    }

    /// Makes every later call to `operation` fail.
    pub fn fail_operation(&self, operation: &str) {
        self.lock().failing.insert(operation.to_owned());
    }

    /// Returns the names of the provider operations called so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Returns every launch request received.
    #[must_use]
    pub fn launches(&self) -> Vec<LaunchRequest> {
        self.lock().launches.clone()
    }

    /// Returns every volume creation request received.
    #[must_use]
    pub fn volume_requests(&self) -> Vec<VolumeRequest> {
        self.lock().volume_requests.clone()
    }

    /// Returns every snapshot request received.
    #[must_use]
    pub fn snapshot_requests(&self) -> Vec<SnapshotRequest> {
        self.lock().snapshot_requests.clone()
    }

    /// Returns the owner ids snapshot listings were filtered by.
    #[must_use]
    pub fn snapshot_owners(&self) -> Vec<String> {
        self.lock().snapshot_owners.clone()
    }

    /// Returns every attach call received.
    #[must_use]
    pub fn attachments(&self) -> Vec<AttachCall> {
        self.lock().attachments.clone()
    }

    /// Returns the instances termination was requested for.
    #[must_use]
    pub fn terminated(&self) -> Vec<String> {
        self.lock().terminated.clone()
    }

    /// Records a call and fails it when scripted to.
    fn enter(&self, operation: &str) -> Result<MutexGuard<'_, FakeState>, FakeProviderError> {
        let mut state = self.lock();
        state.calls.push(operation.to_owned());
        if state.failing.contains(operation) {
            return Err(FakeProviderError::Injected(operation.to_owned()));
        }
        Ok(state)
    }
}

/// Builds a running instance with one security group and a key pair.
#[must_use]
pub fn sample_instance(id: &str) -> Instance {
    Instance {
        id: id.to_owned(),
        instance_type: String::from("DEV1-S"),
        image_id: String::from("img-ubuntu"),
        status: InstanceStatus::Running,
        address: Some(String::from("203.0.113.10")),
        hostname: format!("{id}.example.test"),
        security_groups: vec![SecurityGroup {
            id: String::from("sg-web"),
            name: String::from("web"),
        }],
        zone: String::from("fr-par-1"),
        key_name: Some(String::from("ops")),
    }
}

/// Builds an in-use volume attached to `instance_id` at `device`.
#[must_use]
pub fn attached_volume(id: &str, instance_id: &str, device: &str, size_bytes: u64) -> Volume {
    Volume {
        id: id.to_owned(),
        size_bytes,
        status: VolumeStatus::InUse,
        zone: String::from("fr-par-1"),
        attachments: vec![Attachment {
            device: device.to_owned(),
            instance_id: instance_id.to_owned(),
        }],
    }
}

impl Provider for FakeProvider {
    type Error = FakeProviderError;

    fn root_device(&self) -> &str {
        FAKE_ROOT_DEVICE
    }

    fn list_regions(&self) -> ProviderFuture<'_, Vec<String>, Self::Error> {
        Box::pin(async move { Ok(self.enter("list_regions")?.regions.clone()) })
    }

    fn account_id(&self) -> ProviderFuture<'_, String, Self::Error> {
        Box::pin(async move { Ok(self.enter("account_id")?.account_id.clone()) })
    }

    fn list_instances(&self) -> ProviderFuture<'_, Vec<Instance>, Self::Error> {
        Box::pin(async move { Ok(self.enter("list_instances")?.instances.clone()) })
    }

    fn describe_instance<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> ProviderFuture<'a, Instance, Self::Error> {
        Box::pin(async move {
            let state = self.enter("describe_instance")?;
            state
                .instances
                .iter()
                .find(|instance| instance.id == instance_id)
                .cloned()
                .ok_or_else(|| FakeProviderError::NotFound {
                    kind: "instance",
                    id: instance_id.to_owned(),
                })
        })
    }

    fn create_instances<'a>(
        &'a self,
        request: &'a LaunchRequest,
    ) -> ProviderFuture<'a, Vec<InstanceHandle>, Self::Error> {
        Box::pin(async move {
            let mut state = self.enter("create_instances")?;
            state.launches.push(request.clone());
            let handles = (0..request.count)
                .map(|_| InstanceHandle {
                    id: state.next_id("i"),
                    zone: request.zone.clone(),
                })
                .collect();
            Ok(handles)
        })
    }

    fn terminate_instance<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.enter("terminate_instance")?
                .terminated
                .push(instance_id.to_owned());
            Ok(())
        })
    }

    fn list_volumes(&self) -> ProviderFuture<'_, Vec<Volume>, Self::Error> {
        Box::pin(async move { Ok(self.enter("list_volumes")?.volumes.clone()) })
    }

    fn create_volume<'a>(
        &'a self,
        request: &'a VolumeRequest,
    ) -> ProviderFuture<'a, VolumeHandle, Self::Error> {
        Box::pin(async move {
            let mut state = self.enter("create_volume")?;
            state.volume_requests.push(request.clone());
            Ok(VolumeHandle {
                id: state.next_id("vol"),
                zone: request.zone.clone(),
            })
        })
    }

    fn attach_volume<'a>(
        &'a self,
        volume_id: &'a str,
        instance_id: &'a str,
        device: &'a str,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.enter("attach_volume")?.attachments.push(AttachCall {
                volume_id: volume_id.to_owned(),
                instance_id: instance_id.to_owned(),
                device: device.to_owned(),
            });
            Ok(())
        })
    }

    fn create_snapshot<'a>(
        &'a self,
        volume_id: &'a str,
        description: &'a str,
    ) -> ProviderFuture<'a, SnapshotHandle, Self::Error> {
        Box::pin(async move {
            let mut state = self.enter("create_snapshot")?;
            state.snapshot_requests.push(SnapshotRequest {
                volume_id: volume_id.to_owned(),
                description: description.to_owned(),
            });
            Ok(SnapshotHandle {
                id: state.next_id("snap"),
                volume_id: volume_id.to_owned(),
            })
        })
    }

    fn list_snapshots<'a>(
        &'a self,
        owner_id: &'a str,
    ) -> ProviderFuture<'a, Vec<Snapshot>, Self::Error> {
        Box::pin(async move {
            let mut state = self.enter("list_snapshots")?;
            state.snapshot_owners.push(owner_id.to_owned());
            Ok(state.snapshots.clone())
        })
    }

    fn snapshot_status<'a>(
        &'a self,
        _snapshot_id: &'a str,
    ) -> ProviderFuture<'a, SnapshotStatus, Self::Error> {
        Box::pin(async move {
            let mut state = self.enter("snapshot_status")?;
            Ok(state
                .snapshot_statuses
                .pop_front()
                .unwrap_or(SnapshotStatus::Completed))
        })
    }

    fn volume_status<'a>(
        &'a self,
        _volume_id: &'a str,
    ) -> ProviderFuture<'a, VolumeStatus, Self::Error> {
        Box::pin(async move {
            let mut state = self.enter("volume_status")?;
            Ok(state
                .volume_statuses
                .pop_front()
                .unwrap_or(VolumeStatus::Available))
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets (or, for `None`, removes) environment variables while holding a
    /// global mutex.
    pub async fn set_vars(pairs: &[(&str, Option<&str>)]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe {
                match value {
                    Some(text) => env::set_var(key, text),
                    None => env::remove_var(key),
                }
            }
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in self.previous.iter().rev() {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
