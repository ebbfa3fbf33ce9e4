//! network node parsing

use super::{required_string_arg, string_prop};
use crate::error::{ProvisionError, Result};
use crate::model::StaticNetwork;
use kdl::KdlNode;

/// Parse a network node
///
/// ```kdl
/// network "main" {
///     subnet "subnet-a" group="Public" az="us-east-1a"
/// }
/// ```
pub fn parse_network(node: &KdlNode) -> Result<StaticNetwork> {
    let id = required_string_arg(node, "an id")?;
    let mut network = StaticNetwork::new(id);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "subnet" => {
                    let subnet_id = required_string_arg(child, "a subnet id")?;
                    let group = string_prop(child, "group").ok_or_else(|| {
                        ProvisionError::InvalidConfig(format!(
                            "subnet {} in network {} needs group=",
                            subnet_id, id
                        ))
                    })?;
                    network = network.with_subnet(subnet_id, group, string_prop(child, "az"));
                }
                other => {
                    tracing::warn!("Ignoring unknown node in network {}: {}", id, other);
                }
            }
        }
    }

    Ok(network)
}
