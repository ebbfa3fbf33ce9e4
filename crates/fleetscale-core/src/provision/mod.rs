//! Provisioning pass
//!
//! One pass declares, in order, a key pair, a scalable fleet, its scaling
//! policy and the key retrieval output. Every local input is checked before
//! the first declaration so a bad path or bound never leaves a partial
//! declaration behind.

mod bootstrap;
mod credential;
mod fleet;
mod output;
mod scaling;

pub use bootstrap::{BootstrapPayload, DEFAULT_SHEBANG, load_bootstrap, load_bootstrap_with};
pub use credential::{CredentialHandle, create_credential, key_pair_request};
pub use fleet::{FleetDefinition, build_fleet, resolve_image, select_placement};
pub use output::{
    DEFAULT_KEY_DIR, OUTPUT_NAME, OutputDescriptor, PARAMETER_PREFIX,
    describe_credential_retrieval, describe_credential_retrieval_to,
};
pub use scaling::{
    CPU_UTILIZATION_METRIC, ScalingPolicy, attach_named_utilization_scaling,
    attach_utilization_scaling, validate_target_percent,
};

use crate::error::{ProvisionError, Result};
use crate::model::{FleetSpec, NetworkContext, Project};
use fleetscale_cloud::{CloudProvider, MachineImage};
use std::collections::HashSet;
use std::path::PathBuf;

/// Everything one pass declared for a fleet
#[derive(Debug, Clone)]
pub struct ProvisionedFleet {
    pub credential: CredentialHandle,
    pub fleet: FleetDefinition,
    pub policy: ScalingPolicy,
    pub output: OutputDescriptor,
}

/// Runs provisioning passes against one provider
pub struct Provisioner<'a> {
    provider: &'a dyn CloudProvider,
    region: Option<String>,
    base_dir: PathBuf,
}

impl<'a> Provisioner<'a> {
    pub fn new(provider: &'a dyn CloudProvider) -> Self {
        Self {
            provider,
            region: None,
            base_dir: PathBuf::from("."),
        }
    }

    /// Region written into outputs. Defaults to the provider's region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Directory bootstrap script paths are resolved against
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn region(&self) -> &str {
        self.region
            .as_deref()
            .unwrap_or_else(|| self.provider.region())
    }

    /// Check a fleet without declaring anything.
    ///
    /// Returns the loaded bootstrap payload so the pass does not read it twice.
    pub fn validate(
        &self,
        spec: &FleetSpec,
        network: &dyn NetworkContext,
    ) -> Result<BootstrapPayload> {
        spec.validate()?;
        select_placement(network, &spec.subnet_group)?;
        load_bootstrap_with(self.base_dir.join(&spec.user_data), &spec.shebang)
    }

    /// Declare one fleet and everything that belongs to it
    pub async fn provision(
        &self,
        spec: &FleetSpec,
        network: &dyn NetworkContext,
    ) -> Result<ProvisionedFleet> {
        let bootstrap = self.validate(spec, network)?;
        // Read-only, so resolved before anything is declared
        let image = resolve_image(self.provider, &spec.image).await?;
        self.declare(spec, network, bootstrap, image).await
    }

    /// Declare every fleet of a project.
    ///
    /// All fleets are validated and their images resolved before the first
    /// one is declared.
    pub async fn provision_project(&self, project: &Project) -> Result<Vec<ProvisionedFleet>> {
        let mut key_names = HashSet::new();
        let mut logical_ids = HashSet::new();
        let mut validated = Vec::with_capacity(project.fleets.len());
        for spec in &project.fleets {
            if !key_names.insert(spec.key_name.as_str()) {
                return Err(ProvisionError::DuplicateResource(format!(
                    "key pair {} is used by more than one fleet",
                    spec.key_name
                )));
            }
            let network = project.network_for(spec)?;
            let bootstrap = self.validate(spec, network)?;
            for id in spec.resource_ids() {
                if !logical_ids.insert(id.clone()) {
                    return Err(ProvisionError::DuplicateResource(format!(
                        "logical id {} is derived by more than one resource",
                        id
                    )));
                }
            }
            validated.push((spec, network, bootstrap));
        }

        let mut resolved = Vec::with_capacity(validated.len());
        for (spec, network, bootstrap) in validated {
            let image = resolve_image(self.provider, &spec.image).await?;
            resolved.push((spec, network, bootstrap, image));
        }
        tracing::info!("Validated {} fleet(s) of {}", resolved.len(), project.name);

        let mut provisioned = Vec::with_capacity(resolved.len());
        for (spec, network, bootstrap, image) in resolved {
            provisioned.push(self.declare(spec, network, bootstrap, image).await?);
        }
        Ok(provisioned)
    }

    async fn declare(
        &self,
        spec: &FleetSpec,
        network: &dyn NetworkContext,
        bootstrap: BootstrapPayload,
        image: MachineImage,
    ) -> Result<ProvisionedFleet> {
        let provider_name = self.provider.name();
        tracing::info!("Provisioning fleet {} with {}", spec.id, provider_name);

        let credential =
            create_credential(self.provider, &spec.key_pair_id(), &spec.key_name).await?;

        let fleet = build_fleet(network, &credential, bootstrap, image, spec)?;
        self.provider
            .create_scalable_fleet(&fleet.to_resource(provider_name)?)
            .await?;
        tracing::info!(
            "Fleet {} declared: {} x {} in {} subnet(s), capacity {}..={}",
            spec.id,
            fleet.instance_type(),
            fleet.image().image_id,
            fleet.subnet_ids().len(),
            fleet.capacity().min(),
            fleet.capacity().max()
        );

        let policy =
            attach_named_utilization_scaling(&fleet, &spec.scaling_policy, spec.cpu_target_percent)?;
        self.provider
            .attach_scaling_policy(&policy.to_resource(provider_name)?)
            .await?;
        tracing::debug!(
            "Scaling policy {} targets {}% {}",
            policy.logical_id(),
            policy.target_percent(),
            policy.metric()
        );

        let output = OutputDescriptor::credential_retrieval(
            &spec.id,
            &credential,
            self.region(),
            &spec.key_output_dir,
        );
        self.provider
            .declare_output(&output.to_resource(provider_name)?)
            .await?;

        Ok(ProvisionedFleet {
            credential,
            fleet,
            policy,
            output,
        })
    }
}
