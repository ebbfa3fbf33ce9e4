//! Cloud provider trait definition

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resource type names used as the first half of a resource key
pub mod resource_type {
    pub const KEY_PAIR: &str = "key-pair";
    pub const SCALABLE_FLEET: &str = "scalable-fleet";
    pub const SCALING_POLICY: &str = "scaling-policy";
    pub const OUTPUT: &str = "output";
}

/// Cloud provider abstraction trait
///
/// The provisioner only builds request payloads and hands them over through
/// this trait. Creating, replacing and converging the actual resources is the
/// provider's job.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "synth")
    fn name(&self) -> &str;

    /// Deployment region as the provider sees it.
    ///
    /// May be an unresolved token when the region is only known at deploy time.
    fn region(&self) -> &str;

    /// Resolve the newest machine image matching the query
    async fn lookup_image(&self, query: &ImageQuery) -> Result<MachineImage>;

    /// Declare a key pair. The generated private key is stored by the
    /// provider in its parameter store, never returned here.
    async fn create_key_pair(&self, resource: &ResourceConfig) -> Result<KeyPairInfo>;

    /// Declare an auto-scaling fleet
    async fn create_scalable_fleet(&self, resource: &ResourceConfig) -> Result<()>;

    /// Bind a scaling policy to a previously declared fleet
    async fn attach_scaling_policy(&self, resource: &ResourceConfig) -> Result<()>;

    /// Declare a stack output
    async fn declare_output(&self, resource: &ResourceConfig) -> Result<()>;
}

/// What happens to a resource when its definition is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

impl std::fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemovalPolicy::Destroy => write!(f, "destroy"),
            RemovalPolicy::Retain => write!(f, "retain"),
        }
    }
}

/// Block storage performance class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    Gp2,
    #[default]
    Gp3,
    Io1,
    Io2,
    St1,
    Sc1,
    Standard,
}

impl VolumeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeType::Gp2 => "gp2",
            VolumeType::Gp3 => "gp3",
            VolumeType::Io1 => "io1",
            VolumeType::Io2 => "io2",
            VolumeType::St1 => "st1",
            VolumeType::Sc1 => "sc1",
            VolumeType::Standard => "standard",
        }
    }
}

impl std::str::FromStr for VolumeType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "gp2" => Ok(VolumeType::Gp2),
            "gp3" => Ok(VolumeType::Gp3),
            "io1" => Ok(VolumeType::Io1),
            "io2" => Ok(VolumeType::Io2),
            "st1" => Ok(VolumeType::St1),
            "sc1" => Ok(VolumeType::Sc1),
            "standard" => Ok(VolumeType::Standard),
            other => Err(format!("unknown volume type: {}", other)),
        }
    }
}

impl std::fmt::Display for VolumeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine image lookup by name pattern and owner accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageQuery {
    /// Image name, `*` wildcards allowed
    pub name: String,

    /// Owner account ids. Empty means any owner.
    pub owners: Vec<String>,
}

impl std::fmt::Display for ImageQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.owners.is_empty() {
            write!(f, "name={}", self.name)
        } else {
            write!(f, "name={} owners={}", self.name, self.owners.join(","))
        }
    }
}

/// A concrete machine image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineImage {
    pub image_id: String,

    /// Image name if known (pinned images carry none)
    pub name: Option<String>,
}

impl MachineImage {
    pub fn pinned(image_id: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            name: None,
        }
    }
}

/// Identity of a declared key pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairInfo {
    pub key_name: String,

    /// Provider-assigned key pair id
    pub key_id: String,
}

/// Set of resources to be managed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSet {
    /// Resources indexed by type and ID
    pub resources: HashMap<String, ResourceConfig>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: ResourceConfig) {
        self.resources.insert(resource.key(), resource);
    }

    pub fn get(&self, resource_type: &str, id: &str) -> Option<&ResourceConfig> {
        let key = format!("{}:{}", resource_type, id);
        self.resources.get(&key)
    }

    pub fn contains(&self, resource_type: &str, id: &str) -> bool {
        self.get(resource_type, id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn by_type(&self, resource_type: &str) -> Vec<&ResourceConfig> {
        let mut found: Vec<_> = self
            .resources
            .values()
            .filter(|r| r.resource_type == resource_type)
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }
}

/// Configuration for a cloud resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type (see [`resource_type`])
    pub resource_type: String,

    /// Logical resource identifier, unique per type
    pub id: String,

    /// Provider name
    pub provider: String,

    /// Resource-specific request payload
    pub config: serde_json::Value,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        provider: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            provider: provider.into(),
            config,
        }
    }

    /// Get the full resource key (type:id)
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }

    /// Get a configuration value as a specific type
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Deserialize the whole payload
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.config.clone()).map_err(|e| {
            crate::error::CloudError::InvalidPayload {
                resource: self.key(),
                message: e.to_string(),
            }
        })
    }
}
