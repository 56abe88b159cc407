//! Instance creation and termination.

use crate::model::Instance;
use crate::provider::{BlockDeviceMapping, InstanceHandle, LaunchRequest, Provider};

use super::{FleetError, FleetManager};

/// Optional settings shared by every instance-creating operation.
///
/// Unset fields resolve through one chain: the explicit value here, then the
/// source instance's value (when duplicating), then the configured default.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LaunchOverrides {
    /// Boot image to use instead of the source's.
    pub image_id: Option<String>,
    /// Machine type to use instead of the source's.
    pub instance_type: Option<String>,
    /// Key-pair name to record on the new instances.
    pub key_name: Option<String>,
    /// Security group identifiers to apply.
    pub security_groups: Option<Vec<String>>,
    /// Number of instances to launch; one when unset.
    pub count: Option<u32>,
}

impl LaunchOverrides {
    /// Returns the requested count, defaulting to one.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InvalidCount`] when zero instances are requested.
    pub fn resolved_count<E>(&self) -> Result<u32, FleetError<E>>
    where
        E: std::error::Error + 'static,
    {
        match self.count {
            Some(0) => Err(FleetError::InvalidCount),
            Some(count) => Ok(count),
            None => Ok(1),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

/// First non-blank value along the explicit, source, default chain.
fn first_set(explicit: Option<&str>, source: Option<&str>, default: Option<&str>) -> Option<String> {
    non_blank(explicit)
        .or_else(|| non_blank(source))
        .or_else(|| non_blank(default))
}

fn groups_or(explicit: Option<&[String]>, fallback: Vec<String>) -> Vec<String> {
    match explicit {
        Some(groups) if groups.iter().any(|group| !group.trim().is_empty()) => groups.to_vec(),
        _ => fallback,
    }
}

impl<P> FleetManager<P>
where
    P: Provider,
{
    fn default_groups(&self) -> Vec<String> {
        self.config
            .default_security_group_id()
            .map(|group| vec![group.to_owned()])
            .unwrap_or_default()
    }

    /// Resolves the launch request for a copy of `source`.
    pub(super) fn duplicate_request(
        &self,
        source: &Instance,
        overrides: &LaunchOverrides,
        block_devices: Vec<BlockDeviceMapping>,
    ) -> Result<LaunchRequest, FleetError<P::Error>> {
        let count = overrides.resolved_count()?;
        let source_groups: Vec<String> = source
            .security_groups
            .iter()
            .map(|group| group.id.clone())
            .collect();
        let fallback_groups = if source_groups.is_empty() {
            self.default_groups()
        } else {
            source_groups
        };
        let image_id = first_set(overrides.image_id.as_deref(), Some(source.image_id.as_str()), None);
        let instance_type = first_set(
            overrides.instance_type.as_deref(),
            Some(source.instance_type.as_str()),
            None,
        );
        let key_name = first_set(
            overrides.key_name.as_deref(),
            source.key_name.as_deref(),
            self.config.default_key_name(),
        );

        let request = LaunchRequest::builder()
            .image_id(image_id.unwrap_or_default())
            .instance_type(instance_type.unwrap_or_default())
            .zone(source.zone.clone())
            .key_name(key_name)
            .security_groups(groups_or(
                overrides.security_groups.as_deref(),
                fallback_groups,
            ))
            .count(count)
            .block_devices(block_devices)
            .build()?;
        Ok(request)
    }

    /// Launches `count` instances of `image_id` as `instance_type`.
    ///
    /// Key and security groups default to the configured values. Image and
    /// type overrides are ignored because both are given explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InvalidCount`] or
    /// [`FleetError::MissingParameter`] before any remote call, and
    /// [`FleetError::Provider`] when the launch fails.
    pub async fn start_instance(
        &self,
        image_id: &str,
        instance_type: &str,
        overrides: &LaunchOverrides,
    ) -> Result<Vec<InstanceHandle>, FleetError<P::Error>> {
        let count = overrides.resolved_count()?;
        let request = LaunchRequest::builder()
            .image_id(image_id)
            .instance_type(instance_type)
            .zone(self.config.default_zone.clone())
            .key_name(first_set(
                overrides.key_name.as_deref(),
                None,
                self.config.default_key_name(),
            ))
            .security_groups(groups_or(
                overrides.security_groups.as_deref(),
                self.default_groups(),
            ))
            .count(count)
            .build()?;
        self.launch(&request).await
    }

    /// Requests termination of `instance_id` without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Provider`] when the request fails.
    pub async fn terminate_instance(&self, instance_id: &str) -> Result<(), FleetError<P::Error>> {
        self.provider
            .terminate_instance(instance_id)
            .await
            .map_err(FleetError::Provider)?;
        tracing::info!(instance_id, "termination requested");
        Ok(())
    }

    /// Launches copies of `instance_id` with its image, type, key, and
    /// security groups. Attached volumes are not copied.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InvalidCount`] before any remote call and
    /// [`FleetError::Provider`] when the lookup or launch fails.
    pub async fn duplicate_instance(
        &self,
        instance_id: &str,
        overrides: &LaunchOverrides,
    ) -> Result<Vec<InstanceHandle>, FleetError<P::Error>> {
        overrides.resolved_count::<P::Error>()?;
        let source = self
            .provider
            .describe_instance(instance_id)
            .await
            .map_err(FleetError::Provider)?;
        let request = self.duplicate_request(&source, overrides, Vec::new())?;
        self.launch(&request).await
    }

    pub(super) async fn launch(
        &self,
        request: &LaunchRequest,
    ) -> Result<Vec<InstanceHandle>, FleetError<P::Error>> {
        let handles = self
            .provider
            .create_instances(request)
            .await
            .map_err(FleetError::Provider)?;
        tracing::info!(
            image_id = %request.image_id,
            instance_type = %request.instance_type,
            count = request.count,
            volumes = request.block_devices.len(),
            "launch issued"
        );
        Ok(handles)
    }
}
