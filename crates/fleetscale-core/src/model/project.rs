//! Project definition

use super::fleet::FleetSpec;
use super::network::StaticNetwork;
use crate::error::{ProvisionError, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Everything declared in one fleet.kdl
#[derive(Debug, Clone, Default)]
pub struct Project {
    pub name: String,

    /// Deployment region. `None` leaves it to the provider.
    pub region: Option<String>,

    pub networks: HashMap<String, StaticNetwork>,

    /// Fleets in declaration order
    pub fleets: Vec<FleetSpec>,

    /// Directory relative paths (bootstrap scripts, state) are resolved against
    pub base_dir: PathBuf,
}

impl Project {
    /// Network a fleet is placed in.
    ///
    /// A fleet without an explicit `network` uses the only declared network.
    pub fn network_for(&self, fleet: &FleetSpec) -> Result<&StaticNetwork> {
        match &fleet.network {
            Some(name) => self.networks.get(name).ok_or_else(|| {
                ProvisionError::InvalidConfig(format!(
                    "fleet {} refers to unknown network {}",
                    fleet.id, name
                ))
            }),
            None => {
                let mut networks = self.networks.values();
                match (networks.next(), networks.next()) {
                    (Some(only), None) => Ok(only),
                    (None, _) => Err(ProvisionError::InvalidConfig(format!(
                        "fleet {} needs a network, but none is declared",
                        fleet.id
                    ))),
                    (Some(_), Some(_)) => Err(ProvisionError::InvalidConfig(format!(
                        "fleet {} must name its network, {} are declared",
                        fleet.id,
                        self.networks.len()
                    ))),
                }
            }
        }
    }

    pub fn fleet(&self, id: &str) -> Option<&FleetSpec> {
        self.fleets.iter().find(|f| f.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with(networks: &[&str]) -> Project {
        Project {
            name: "test".to_string(),
            networks: networks
                .iter()
                .map(|n| (n.to_string(), StaticNetwork::new(*n)))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_network_is_implicit() {
        let project = project_with(&["main"]);
        let fleet = FleetSpec::new("Asg");
        assert_eq!(project.network_for(&fleet).unwrap().id, "main");
    }

    #[test]
    fn test_ambiguous_network_is_error() {
        let project = project_with(&["a", "b"]);
        let fleet = FleetSpec::new("Asg");
        assert!(matches!(
            project.network_for(&fleet),
            Err(ProvisionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_named_network() {
        let project = project_with(&["a", "b"]);
        let mut fleet = FleetSpec::new("Asg");
        fleet.network = Some("b".to_string());
        assert_eq!(project.network_for(&fleet).unwrap().id, "b");

        fleet.network = Some("c".to_string());
        assert!(project.network_for(&fleet).is_err());
    }
}
