//! Network placement

use serde::{Deserialize, Serialize};

/// Handle to an externally owned virtual network.
///
/// The provisioner only reads from it.
pub trait NetworkContext: Send + Sync {
    /// Identifier of the network
    fn network_id(&self) -> &str;

    /// Subnets belonging to the named subnet group. Group names match exactly.
    fn select_subnets(&self, group_name: &str) -> SubnetSet;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub subnet_id: String,

    /// Logical subnet group ("Public", "Private", ...)
    pub group: String,

    pub availability_zone: Option<String>,
}

/// Result of a subnet selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSet {
    pub group_name: String,
    pub subnets: Vec<Subnet>,
}

impl SubnetSet {
    pub fn is_empty(&self) -> bool {
        self.subnets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subnets.len()
    }

    pub fn subnet_ids(&self) -> Vec<String> {
        self.subnets.iter().map(|s| s.subnet_id.clone()).collect()
    }
}

/// Network whose subnets are listed up front, e.g. in fleet.kdl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticNetwork {
    pub id: String,
    pub subnets: Vec<Subnet>,
}

impl StaticNetwork {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subnets: Vec::new(),
        }
    }

    pub fn with_subnet(
        mut self,
        subnet_id: impl Into<String>,
        group: impl Into<String>,
        availability_zone: Option<&str>,
    ) -> Self {
        self.subnets.push(Subnet {
            subnet_id: subnet_id.into(),
            group: group.into(),
            availability_zone: availability_zone.map(|s| s.to_string()),
        });
        self
    }
}

impl NetworkContext for StaticNetwork {
    fn network_id(&self) -> &str {
        &self.id
    }

    fn select_subnets(&self, group_name: &str) -> SubnetSet {
        SubnetSet {
            group_name: group_name.to_string(),
            subnets: self
                .subnets
                .iter()
                .filter(|s| s.group == group_name)
                .cloned()
                .collect(),
        }
    }
}
