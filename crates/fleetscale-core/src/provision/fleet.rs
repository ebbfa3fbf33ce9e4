//! Fleet definition builder

use super::bootstrap::BootstrapPayload;
use super::credential::CredentialHandle;
use crate::error::{ProvisionError, Result};
use crate::model::{
    CapacityBounds, FleetSpec, HealthCheckPolicy, ImageSource, NetworkContext, RootVolume,
    SubnetSet,
};
use fleetscale_cloud::{CloudProvider, MachineImage, ResourceConfig, resource_type};
use serde::Serialize;

/// Everything the provider needs to create one auto-scaling fleet.
///
/// Only [`build_fleet`] constructs it, after every input has been checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FleetDefinition {
    #[serde(skip)]
    logical_id: String,
    image: MachineImage,
    instance_type: String,
    block_devices: Vec<RootVolume>,
    network_id: String,
    subnet_group: String,
    subnet_ids: Vec<String>,
    key_name: String,
    capacity: CapacityBounds,
    health_check: HealthCheckPolicy,
    ssm_session_permissions: bool,
    user_data: BootstrapPayload,
}

impl FleetDefinition {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn image(&self) -> &MachineImage {
        &self.image
    }

    pub fn instance_type(&self) -> &str {
        &self.instance_type
    }

    pub fn root_volume(&self) -> &RootVolume {
        &self.block_devices[0]
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn subnet_group(&self) -> &str {
        &self.subnet_group
    }

    pub fn subnet_ids(&self) -> &[String] {
        &self.subnet_ids
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn capacity(&self) -> CapacityBounds {
        self.capacity
    }

    pub fn health_check(&self) -> HealthCheckPolicy {
        self.health_check
    }

    pub fn ssm_session_permissions(&self) -> bool {
        self.ssm_session_permissions
    }

    pub fn user_data(&self) -> &BootstrapPayload {
        &self.user_data
    }

    /// Request payload for [`CloudProvider::create_scalable_fleet`]
    pub fn to_resource(&self, provider: &str) -> Result<ResourceConfig> {
        let config = serde_json::to_value(self).map_err(|e| {
            ProvisionError::InvalidConfig(format!("cannot encode fleet {}: {}", self.logical_id, e))
        })?;
        Ok(ResourceConfig::new(
            resource_type::SCALABLE_FLEET,
            &self.logical_id,
            provider,
            config,
        ))
    }
}

/// Resolve the machine image for a fleet.
///
/// A lookup returns whatever image currently matches, so two passes may
/// yield different ids. Pin the image to avoid that.
pub async fn resolve_image(
    provider: &dyn CloudProvider,
    source: &ImageSource,
) -> Result<MachineImage> {
    match source {
        ImageSource::Pinned(image_id) => Ok(MachineImage::pinned(image_id.clone())),
        ImageSource::Lookup(query) => {
            let image = provider.lookup_image(query).await?;
            tracing::info!("Resolved image {} to {}", query, image.image_id);
            Ok(image)
        }
    }
}

/// Subnets of `group` in `network`. An empty group is a topology error.
pub fn select_placement(network: &dyn NetworkContext, group: &str) -> Result<SubnetSet> {
    let subnets = network.select_subnets(group);
    if subnets.is_empty() {
        return Err(ProvisionError::Topology {
            network: network.network_id().to_string(),
            group: group.to_string(),
        });
    }
    tracing::debug!(
        "Placing in {} subnets of group {} in {}",
        subnets.len(),
        group,
        network.network_id()
    );
    Ok(subnets)
}

/// Assemble a fleet definition from already validated parts
pub fn build_fleet(
    network: &dyn NetworkContext,
    credential: &CredentialHandle,
    bootstrap: BootstrapPayload,
    image: MachineImage,
    spec: &FleetSpec,
) -> Result<FleetDefinition> {
    if credential.key_name.is_empty() {
        return Err(ProvisionError::Validation(
            "fleet needs a declared key pair".to_string(),
        ));
    }
    let placement = select_placement(network, &spec.subnet_group)?;

    Ok(FleetDefinition {
        logical_id: spec.id.clone(),
        image,
        instance_type: spec.instance_type.clone(),
        block_devices: vec![spec.root_volume.clone()],
        network_id: network.network_id().to_string(),
        subnet_group: placement.group_name.clone(),
        subnet_ids: placement.subnet_ids(),
        key_name: credential.key_name.clone(),
        capacity: spec.capacity,
        health_check: spec.health_check,
        ssm_session_permissions: spec.ssm_session_permissions,
        user_data: bootstrap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StaticNetwork;
    use fleetscale_cloud::{RemovalPolicy, VolumeType};

    fn credential() -> CredentialHandle {
        CredentialHandle {
            logical_id: "AsgKeyPair".to_string(),
            key_name: "test-key-pair".to_string(),
            key_id: "key-0abc".to_string(),
            removal_policy: RemovalPolicy::Destroy,
        }
    }

    fn network() -> StaticNetwork {
        StaticNetwork::new("vpc-main")
            .with_subnet("subnet-a", "Public", Some("ap-northeast-1a"))
            .with_subnet("subnet-b", "Public", Some("ap-northeast-1c"))
            .with_subnet("subnet-c", "Private", None)
    }

    fn payload() -> BootstrapPayload {
        BootstrapPayload::new("#!/bin/bash", "echo ok\n").unwrap()
    }

    #[test]
    fn test_build_uses_only_the_named_group() {
        let spec = FleetSpec::new("Asg");
        let fleet = build_fleet(
            &network(),
            &credential(),
            payload(),
            MachineImage::pinned("ami-123"),
            &spec,
        )
        .unwrap();

        assert_eq!(fleet.subnet_ids(), ["subnet-a", "subnet-b"]);
        assert_eq!(fleet.network_id(), "vpc-main");
        assert_eq!(fleet.key_name(), "test-key-pair");
        assert_eq!(fleet.capacity().min(), 2);
        assert_eq!(fleet.capacity().max(), 3);
        assert_eq!(fleet.instance_type(), "t3.micro");
        assert!(fleet.root_volume().is_encrypted());
        assert_eq!(fleet.root_volume().volume_type(), VolumeType::Gp3);
        assert_eq!(fleet.health_check().kind(), "ELB");
        assert!(fleet.ssm_session_permissions());
    }

    #[test]
    fn test_bounds_reach_the_definition_unchanged() {
        for (min, max) in [(0, 0), (2, 3), (5, 5), (3, 2), (10, 1)] {
            let built = CapacityBounds::new(min, max).and_then(|capacity| {
                let mut spec = FleetSpec::new("Asg");
                spec.capacity = capacity;
                build_fleet(
                    &network(),
                    &credential(),
                    payload(),
                    MachineImage::pinned("ami-123"),
                    &spec,
                )
            });
            if min > max {
                assert!(matches!(built, Err(ProvisionError::Validation(_))));
            } else {
                let capacity = built.unwrap().capacity();
                assert_eq!((capacity.min() as i64, capacity.max() as i64), (min, max));
            }
        }
    }

    #[test]
    fn test_empty_group_is_topology_error() {
        let mut spec = FleetSpec::new("Asg");
        spec.subnet_group = "Isolated".to_string();
        let err = build_fleet(
            &network(),
            &credential(),
            payload(),
            MachineImage::pinned("ami-123"),
            &spec,
        )
        .unwrap_err();

        match err {
            ProvisionError::Topology { network, group } => {
                assert_eq!(network, "vpc-main");
                assert_eq!(group, "Isolated");
            }
            other => panic!("Expected Topology error, got {:?}", other),
        }
    }

    #[test]
    fn test_group_match_is_case_sensitive() {
        assert!(select_placement(&network(), "public").is_err());
    }

    #[test]
    fn test_payload_shape() {
        let fleet = build_fleet(
            &network(),
            &credential(),
            payload(),
            MachineImage::pinned("ami-123"),
            &FleetSpec::new("Asg"),
        )
        .unwrap();
        let resource = fleet.to_resource("synth").unwrap();

        assert_eq!(resource.key(), "scalable-fleet:Asg");
        assert_eq!(resource.config["image"]["image_id"], "ami-123");
        assert_eq!(resource.config["block_devices"][0]["device_name"], "/dev/sda1");
        assert_eq!(resource.config["block_devices"][0]["size_gib"], 10);
        assert_eq!(resource.config["block_devices"][0]["volume_type"], "gp3");
        assert_eq!(resource.config["block_devices"][0]["encrypted"], true);
        assert_eq!(resource.config["health_check"]["type"], "ELB");
        assert_eq!(resource.config["health_check"]["grace_period_secs"], 600);
        assert_eq!(resource.config["user_data"], "#!/bin/bash\necho ok\n");
        assert!(resource.config.get("logical_id").is_none());
    }

    #[tokio::test]
    async fn test_pinned_image_skips_lookup() {
        let provider = fleetscale_cloud_synth::SynthProvider::new(None);
        let image = resolve_image(&provider, &ImageSource::Pinned("ami-pinned".to_string()))
            .await
            .unwrap();
        assert_eq!(image, MachineImage::pinned("ami-pinned"));
    }

    #[tokio::test]
    async fn test_lookup_without_match_is_provider_error() {
        let provider = fleetscale_cloud_synth::SynthProvider::new(None);
        let err = resolve_image(&provider, &ImageSource::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Provider(_)));
    }
}
