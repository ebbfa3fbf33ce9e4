//! Synthesizing provider implementation

use crate::catalog::ImageCatalog;
use crate::template::{self, KeyPairProps, PolicyProps};
use async_trait::async_trait;
use fleetscale_cloud::{
    CloudError, CloudProvider, ImageQuery, KeyPairInfo, MachineImage, ResourceConfig, ResourceSet,
    Result, resource_type,
};
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Region token resolved by CloudFormation at deploy time
pub const REGION_TOKEN: &str = "${AWS::Region}";

/// Provider that records every declaration in memory and renders them as a
/// CloudFormation template. Nothing is sent anywhere.
pub struct SynthProvider {
    region: String,
    catalog: ImageCatalog,
    /// Key pair names already taken in the target account
    existing_key_names: HashSet<String>,
    declared: Mutex<ResourceSet>,
}

impl SynthProvider {
    /// `region` of `None` leaves the region to be resolved at deploy time
    pub fn new(region: Option<String>) -> Self {
        Self {
            region: region.unwrap_or_else(|| REGION_TOKEN.to_string()),
            catalog: ImageCatalog::default(),
            existing_key_names: HashSet::new(),
            declared: Mutex::new(ResourceSet::new()),
        }
    }

    pub fn with_catalog(mut self, catalog: ImageCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Mark a key pair name as already present in the target account
    pub fn with_existing_key_pair(mut self, key_name: impl Into<String>) -> Self {
        self.existing_key_names.insert(key_name.into());
        self
    }

    /// Snapshot of everything declared so far
    pub async fn resources(&self) -> ResourceSet {
        self.declared.lock().await.clone()
    }

    /// Render the declared resources as a CloudFormation template
    pub async fn template(&self) -> Result<serde_json::Value> {
        let declared = self.declared.lock().await;
        template::render(&declared)
    }

    /// Record a resource of the expected type, rejecting duplicate logical ids
    /// and template resource names
    async fn declare(&self, expected_type: &str, resource: &ResourceConfig) -> Result<()> {
        if resource.resource_type != expected_type {
            return Err(CloudError::UnsupportedResource(format!(
                "expected {}, got {}",
                expected_type,
                resource.key()
            )));
        }

        let mut declared = self.declared.lock().await;
        if declared.contains(&resource.resource_type, &resource.id) {
            return Err(CloudError::ResourceAlreadyExists(resource.key()));
        }
        // Every declaration shares one template namespace
        let names = template::rendered_ids(resource);
        if let Some(taken) = declared
            .iter()
            .flat_map(template::rendered_ids)
            .find(|name| names.contains(name))
        {
            return Err(CloudError::ResourceAlreadyExists(format!(
                "template resource {} ({})",
                taken,
                resource.key()
            )));
        }

        let mut resource = resource.clone();
        resource.provider = self.name().to_string();
        declared.add(resource);
        Ok(())
    }
}

#[async_trait]
impl CloudProvider for SynthProvider {
    fn name(&self) -> &str {
        "synth"
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn lookup_image(&self, query: &ImageQuery) -> Result<MachineImage> {
        if self.catalog.is_empty() {
            return Err(CloudError::ImageNotFound(format!(
                "{} (image catalog is empty, add .fleetscale/{} or pin the image)",
                query,
                crate::catalog::CATALOG_FILE
            )));
        }
        let image = self
            .catalog
            .find(query)
            .ok_or_else(|| CloudError::ImageNotFound(query.to_string()))?;
        tracing::debug!("Resolved image {} to {}", query, image.image_id);
        Ok(image)
    }

    async fn create_key_pair(&self, resource: &ResourceConfig) -> Result<KeyPairInfo> {
        let props: KeyPairProps = resource.payload()?;

        if self.existing_key_names.contains(&props.key_name) {
            return Err(CloudError::ResourceAlreadyExists(format!(
                "key pair {}",
                props.key_name
            )));
        }
        let taken = self
            .declared
            .lock()
            .await
            .by_type(resource_type::KEY_PAIR)
            .iter()
            .any(|k| {
                k.get_config::<String>("key_name").as_deref() == Some(props.key_name.as_str())
            });
        if taken {
            return Err(CloudError::ResourceAlreadyExists(format!(
                "key pair {}",
                props.key_name
            )));
        }

        self.declare(resource_type::KEY_PAIR, resource).await?;
        tracing::info!(
            "Declared key pair {} (removal policy: {})",
            props.key_name,
            props.removal_policy
        );

        Ok(KeyPairInfo {
            key_id: format!("${{{}.KeyPairId}}", resource.id),
            key_name: props.key_name,
        })
    }

    async fn create_scalable_fleet(&self, resource: &ResourceConfig) -> Result<()> {
        self.declare(resource_type::SCALABLE_FLEET, resource).await?;
        tracing::info!("Declared scalable fleet {}", resource.id);
        Ok(())
    }

    async fn attach_scaling_policy(&self, resource: &ResourceConfig) -> Result<()> {
        let props: PolicyProps = resource.payload()?;
        let fleet_declared = self
            .declared
            .lock()
            .await
            .contains(resource_type::SCALABLE_FLEET, &props.fleet_id);
        if !fleet_declared {
            return Err(CloudError::ResourceNotFound(format!(
                "{}:{}",
                resource_type::SCALABLE_FLEET,
                props.fleet_id
            )));
        }

        self.declare(resource_type::SCALING_POLICY, resource).await?;
        tracing::info!(
            "Attached scaling policy {} to {}",
            resource.id,
            props.fleet_id
        );
        Ok(())
    }

    async fn declare_output(&self, resource: &ResourceConfig) -> Result<()> {
        self.declare(resource_type::OUTPUT, resource).await?;
        tracing::debug!("Declared output {}", resource.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogImage;
    use chrono::Utc;
    use serde_json::json;

    fn key_pair(id: &str, name: &str) -> ResourceConfig {
        ResourceConfig::new(
            resource_type::KEY_PAIR,
            id,
            "fleetscale",
            json!({ "key_name": name, "removal_policy": "destroy" }),
        )
    }

    #[test]
    fn test_region_defaults_to_deploy_time_token() {
        assert_eq!(SynthProvider::new(None).region(), REGION_TOKEN);
        assert_eq!(
            SynthProvider::new(Some("us-east-1".to_string())).region(),
            "us-east-1"
        );
    }

    #[tokio::test]
    async fn test_key_pair_id_is_attribute_token() {
        let provider = SynthProvider::new(None);
        let info = provider
            .create_key_pair(&key_pair("AsgKeyPair", "test-key-pair"))
            .await
            .unwrap();

        assert_eq!(info.key_name, "test-key-pair");
        assert_eq!(info.key_id, "${AsgKeyPair.KeyPairId}");

        let declared = provider.resources().await;
        assert_eq!(
            declared
                .get(resource_type::KEY_PAIR, "AsgKeyPair")
                .map(|r| r.provider.as_str()),
            Some("synth")
        );
    }

    #[tokio::test]
    async fn test_existing_key_name_is_duplicate() {
        let provider = SynthProvider::new(None).with_existing_key_pair("test-key-pair");
        let err = provider
            .create_key_pair(&key_pair("AsgKeyPair", "test-key-pair"))
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::ResourceAlreadyExists(_)));
        assert!(provider.resources().await.is_empty());
    }

    #[tokio::test]
    async fn test_same_key_name_twice_is_duplicate() {
        let provider = SynthProvider::new(None);
        provider
            .create_key_pair(&key_pair("FirstKeyPair", "shared"))
            .await
            .unwrap();
        let err = provider
            .create_key_pair(&key_pair("SecondKeyPair", "shared"))
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::ResourceAlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_policy_requires_declared_fleet() {
        let provider = SynthProvider::new(None);
        let policy = ResourceConfig::new(
            resource_type::SCALING_POLICY,
            "AsgCpuScaling",
            "fleetscale",
            json!({
                "fleet_id": "Asg",
                "metric": "ASGAverageCPUUtilization",
                "target_percent": 50,
            }),
        );
        let err = provider.attach_scaling_policy(&policy).await.unwrap_err();
        assert!(matches!(err, CloudError::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_template_name_taken_by_other_type_is_duplicate() {
        let provider = SynthProvider::new(None);
        provider
            .create_key_pair(&key_pair("Web", "web-key-pair"))
            .await
            .unwrap();
        let fleet = ResourceConfig::new(
            resource_type::SCALABLE_FLEET,
            "Web",
            "fleetscale",
            json!({ "ssm_session_permissions": false }),
        );

        let err = provider.create_scalable_fleet(&fleet).await.unwrap_err();
        assert!(matches!(err, CloudError::ResourceAlreadyExists(name) if name.contains("Web")));
        assert_eq!(provider.resources().await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_catalog_names_the_catalog_file() {
        let provider = SynthProvider::new(None);
        let query = ImageQuery {
            name: "RHEL*".to_string(),
            owners: vec![],
        };
        match provider.lookup_image(&query).await {
            Err(CloudError::ImageNotFound(message)) => assert!(message.contains("images.json")),
            other => panic!("Expected ImageNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_resource_type_is_rejected() {
        let provider = SynthProvider::new(None);
        let err = provider
            .declare_output(&key_pair("AsgKeyPair", "k"))
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::UnsupportedResource(_)));
    }

    #[tokio::test]
    async fn test_lookup_image_uses_catalog() {
        let catalog = ImageCatalog::new(vec![CatalogImage {
            image_id: "ami-0abc".to_string(),
            name: "RHEL-9.2.0_HVM-20230726-x86_64-61-Hourly2-GP2".to_string(),
            owner: "309956199498".to_string(),
            creation_date: Utc::now(),
        }]);
        let provider = SynthProvider::new(None).with_catalog(catalog);

        let query = ImageQuery {
            name: "RHEL-9.2.0_HVM-20230726-x86_64-61-Hourly2-GP2".to_string(),
            owners: vec!["309956199498".to_string()],
        };
        assert_eq!(
            provider.lookup_image(&query).await.unwrap().image_id,
            "ami-0abc"
        );

        let missing = ImageQuery {
            name: "Ubuntu*".to_string(),
            owners: vec![],
        };
        assert!(matches!(
            provider.lookup_image(&missing).await,
            Err(CloudError::ImageNotFound(_))
        ));
    }
}
