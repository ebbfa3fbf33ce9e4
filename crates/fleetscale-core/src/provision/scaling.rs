//! Target-tracking scaling policies

use super::fleet::FleetDefinition;
use crate::error::{ProvisionError, Result};
use crate::model::{DEFAULT_SCALING_POLICY, validate_logical_id};
use fleetscale_cloud::{ResourceConfig, resource_type};
use serde::Serialize;

/// Average CPU utilization across the fleet
pub const CPU_UTILIZATION_METRIC: &str = "ASGAverageCPUUtilization";

/// Target utilization must be in `(0, 100]`
pub fn validate_target_percent(target: i64) -> Result<u32> {
    if target <= 0 || target > 100 {
        return Err(ProvisionError::Validation(format!(
            "target utilization must be in (0, 100], got {}",
            target
        )));
    }
    Ok(target as u32)
}

/// Scaling policy bound to one fleet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalingPolicy {
    #[serde(skip)]
    name: String,
    fleet_id: String,
    metric: &'static str,
    target_percent: u32,
}

impl ScalingPolicy {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fleet_id(&self) -> &str {
        &self.fleet_id
    }

    pub fn metric(&self) -> &str {
        self.metric
    }

    pub fn target_percent(&self) -> u32 {
        self.target_percent
    }

    /// Logical id of the policy resource, prefixed by its fleet
    pub fn logical_id(&self) -> String {
        format!("{}{}", self.fleet_id, self.name)
    }

    pub fn to_resource(&self, provider: &str) -> Result<ResourceConfig> {
        let config = serde_json::to_value(self).map_err(|e| {
            ProvisionError::InvalidConfig(format!("cannot encode policy {}: {}", self.name, e))
        })?;
        Ok(ResourceConfig::new(
            resource_type::SCALING_POLICY,
            self.logical_id(),
            provider,
            config,
        ))
    }
}

/// Scale `fleet` to keep average CPU at `target_percent`
pub fn attach_utilization_scaling(
    fleet: &FleetDefinition,
    target_percent: i64,
) -> Result<ScalingPolicy> {
    attach_named_utilization_scaling(fleet, DEFAULT_SCALING_POLICY, target_percent)
}

pub fn attach_named_utilization_scaling(
    fleet: &FleetDefinition,
    name: &str,
    target_percent: i64,
) -> Result<ScalingPolicy> {
    validate_logical_id("scaling policy name", name)?;
    let target_percent = validate_target_percent(target_percent)?;

    Ok(ScalingPolicy {
        name: name.to_string(),
        fleet_id: fleet.logical_id().to_string(),
        metric: CPU_UTILIZATION_METRIC,
        target_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FleetSpec, StaticNetwork};
    use crate::provision::bootstrap::BootstrapPayload;
    use crate::provision::credential::CredentialHandle;
    use crate::provision::fleet::build_fleet;
    use fleetscale_cloud::{MachineImage, RemovalPolicy};

    fn fleet() -> FleetDefinition {
        let network = StaticNetwork::new("vpc").with_subnet("subnet-a", "Public", None);
        let credential = CredentialHandle {
            logical_id: "AsgKeyPair".to_string(),
            key_name: "k".to_string(),
            key_id: "key-1".to_string(),
            removal_policy: RemovalPolicy::Destroy,
        };
        build_fleet(
            &network,
            &credential,
            BootstrapPayload::new("#!/bin/bash", "").unwrap(),
            MachineImage::pinned("ami-1"),
            &FleetSpec::new("Asg"),
        )
        .unwrap()
    }

    #[test]
    fn test_target_bounds() {
        for valid in [1, 50, 100] {
            assert_eq!(validate_target_percent(valid).unwrap() as i64, valid);
        }
        for invalid in [0, -5, 101, 150] {
            assert!(matches!(
                validate_target_percent(invalid),
                Err(ProvisionError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = attach_utilization_scaling(&fleet(), 50).unwrap();
        assert_eq!(policy.name(), "CpuScaling");
        assert_eq!(policy.fleet_id(), "Asg");
        assert_eq!(policy.metric(), CPU_UTILIZATION_METRIC);
        assert_eq!(policy.target_percent(), 50);
        assert_eq!(policy.logical_id(), "AsgCpuScaling");
    }

    #[test]
    fn test_payload_shape() {
        let resource = attach_utilization_scaling(&fleet(), 70)
            .unwrap()
            .to_resource("synth")
            .unwrap();
        assert_eq!(resource.key(), "scaling-policy:AsgCpuScaling");
        assert_eq!(resource.config["fleet_id"], "Asg");
        assert_eq!(resource.config["metric"], "ASGAverageCPUUtilization");
        assert_eq!(resource.config["target_percent"], 70);
    }

    #[test]
    fn test_out_of_range_target_is_rejected() {
        assert!(attach_utilization_scaling(&fleet(), 0).is_err());
        assert!(attach_utilization_scaling(&fleet(), 101).is_err());
        assert!(attach_named_utilization_scaling(&fleet(), "", 50).is_err());
        assert!(attach_named_utilization_scaling(&fleet(), "cpu-scaling", 50).is_err());
    }
}
