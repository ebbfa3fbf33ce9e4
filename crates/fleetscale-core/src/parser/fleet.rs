//! fleet node parsing

use super::{
    args, bool_arg, integer_arg, integer_prop, required_string_arg, string_arg, string_prop,
};
use crate::error::{ProvisionError, Result};
use crate::model::{CapacityBounds, FleetSpec, HealthCheckPolicy, ImageSource, RootVolume};
use fleetscale_cloud::{ImageQuery, VolumeType};
use kdl::KdlNode;
use std::path::PathBuf;
use std::time::Duration;

/// Parse a fleet node. Anything left out keeps its default.
pub fn parse_fleet(node: &KdlNode) -> Result<FleetSpec> {
    let id = required_string_arg(node, "an id")?;
    let mut fleet = FleetSpec::new(id);

    let Some(children) = node.children() else {
        return Ok(fleet);
    };

    for child in children.nodes() {
        match child.name().value() {
            "network" => {
                fleet.network = Some(required_string_arg(child, "a network id")?.to_string());
            }
            "key-pair" | "key_pair" => {
                fleet.key_name = required_string_arg(child, "a key pair name")?.to_string();
            }
            "user-data" | "user_data" => {
                fleet.user_data = PathBuf::from(required_string_arg(child, "a script path")?);
                if let Some(shebang) = string_prop(child, "shebang") {
                    fleet.shebang = shebang.to_string();
                }
            }
            "image" => {
                fleet.image = parse_image(child)?;
            }
            "instance-type" | "instance_type" => {
                fleet.instance_type = required_string_arg(child, "an instance type")?.to_string();
            }
            "root-volume" | "root_volume" => {
                fleet.root_volume = parse_root_volume(child)?;
            }
            "subnet-group" | "subnet_group" => {
                fleet.subnet_group = required_string_arg(child, "a group name")?.to_string();
            }
            "capacity" => {
                fleet.capacity = parse_capacity(child)?;
            }
            "health-check" | "health_check" => {
                fleet.health_check = parse_health_check(child)?;
            }
            "ssm-session" | "ssm_session" => {
                fleet.ssm_session_permissions = bool_arg(child).unwrap_or(true);
            }
            "cpu-target" | "cpu_target" => {
                if let Some(target) = integer_arg(child)? {
                    fleet.cpu_target_percent = target;
                }
            }
            "scaling" => {
                fleet.scaling_policy = required_string_arg(child, "a policy name")?.to_string();
                if let Some(target) = integer_prop(child, "cpu-target")? {
                    fleet.cpu_target_percent = target;
                }
            }
            "key-output-dir" | "key_output_dir" => {
                fleet.key_output_dir = required_string_arg(child, "a directory")?.to_string();
            }
            other => {
                tracing::warn!("Ignoring unknown node in fleet {}: {}", id, other);
            }
        }
    }

    Ok(fleet)
}

/// `image "ami-..."` pins, `image { name ...; owners ...; id ... }` looks up
/// unless an id is given.
fn parse_image(node: &KdlNode) -> Result<ImageSource> {
    if let Some(image_id) = string_arg(node) {
        return Ok(ImageSource::Pinned(image_id.to_string()));
    }

    let mut name = None;
    let mut owners = Vec::new();
    let mut pinned = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "name" => name = string_arg(child).map(|s| s.to_string()),
                "owners" | "owner" => {
                    owners.extend(args(child).filter_map(|v| v.as_string()).map(String::from));
                }
                "id" => pinned = string_arg(child).map(|s| s.to_string()),
                other => tracing::warn!("Ignoring unknown node in image: {}", other),
            }
        }
    }

    if let Some(image_id) = pinned {
        return Ok(ImageSource::Pinned(image_id));
    }
    let name = name.ok_or_else(|| {
        ProvisionError::InvalidConfig("image needs a name or an id".to_string())
    })?;
    Ok(ImageSource::Lookup(ImageQuery { name, owners }))
}

fn parse_root_volume(node: &KdlNode) -> Result<RootVolume> {
    let defaults = RootVolume::default();
    if node.get("encrypted").and_then(|v| v.as_bool()) == Some(false) {
        return Err(ProvisionError::Validation(
            "root volume encryption cannot be disabled".to_string(),
        ));
    }

    let device = string_prop(node, "device").unwrap_or(defaults.device_name());
    let size = match integer_prop(node, "size")? {
        Some(size) => u32::try_from(size).map_err(|_| {
            ProvisionError::Validation(format!("root volume size {} is out of range", size))
        })?,
        None => defaults.size_gib(),
    };
    let volume_type = match string_prop(node, "type") {
        Some(t) => t
            .parse::<VolumeType>()
            .map_err(ProvisionError::InvalidConfig)?,
        None => defaults.volume_type(),
    };

    Ok(RootVolume::new(device, size, volume_type))
}

fn parse_capacity(node: &KdlNode) -> Result<CapacityBounds> {
    let min = integer_prop(node, "min")?;
    let max = integer_prop(node, "max")?;
    let (Some(min), Some(max)) = (min, max) else {
        return Err(ProvisionError::Validation(
            "capacity needs both min= and max=".to_string(),
        ));
    };

    let bounds = CapacityBounds::new(min, max)?;
    match integer_prop(node, "desired")? {
        Some(desired) => bounds.with_desired(desired),
        None => Ok(bounds),
    }
}

fn parse_health_check(node: &KdlNode) -> Result<HealthCheckPolicy> {
    let kind = string_arg(node).unwrap_or("elb");
    if !kind.eq_ignore_ascii_case("elb") {
        return Err(ProvisionError::Validation(format!(
            "unsupported health check type: {}",
            kind
        )));
    }

    let grace = match (
        integer_prop(node, "grace-minutes")?,
        integer_prop(node, "grace-seconds")?,
    ) {
        (Some(_), Some(_)) => {
            return Err(ProvisionError::InvalidConfig(
                "health-check takes grace-minutes= or grace-seconds=, not both".to_string(),
            ));
        }
        (Some(minutes), None) => non_negative_duration(minutes, 60)?,
        (None, Some(seconds)) => non_negative_duration(seconds, 1)?,
        (None, None) => HealthCheckPolicy::default().grace(),
    };

    Ok(HealthCheckPolicy::elb(grace))
}

fn non_negative_duration(value: i64, unit_secs: u64) -> Result<Duration> {
    u64::try_from(value)
        .ok()
        .and_then(|v| v.checked_mul(unit_secs))
        .map(Duration::from_secs)
        .ok_or_else(|| {
            ProvisionError::Validation(format!("grace period {} is out of range", value))
        })
}
