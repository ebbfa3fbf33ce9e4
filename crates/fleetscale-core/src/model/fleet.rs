//! Fleet configuration

use crate::error::{ProvisionError, Result};
use fleetscale_cloud::{ImageQuery, VolumeType};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_IMAGE_NAME: &str = "RHEL-9.2.0_HVM-20230726-x86_64-61-Hourly2-GP2";
pub const DEFAULT_IMAGE_OWNER: &str = "309956199498";
pub const DEFAULT_INSTANCE_TYPE: &str = "t3.micro";
pub const DEFAULT_USER_DATA: &str = "ec2/user-data.sh";
pub const DEFAULT_SUBNET_GROUP: &str = "Public";
pub const DEFAULT_SCALING_POLICY: &str = "CpuScaling";
pub const DEFAULT_CPU_TARGET: i64 = 50;
pub const DEFAULT_GRACE: Duration = Duration::from_secs(10 * 60);

const MAX_KEY_NAME_LEN: usize = 255;

/// Minimum and maximum fleet size.
///
/// Construct through [`CapacityBounds::new`] so that `min <= max` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacityBounds {
    min: u32,
    max: u32,
    desired: Option<u32>,
}

impl CapacityBounds {
    pub fn new(min: i64, max: i64) -> Result<Self> {
        let min = non_negative("minimum capacity", min)?;
        let max = non_negative("maximum capacity", max)?;
        if min > max {
            return Err(ProvisionError::Validation(format!(
                "minimum capacity {} exceeds maximum capacity {}",
                min, max
            )));
        }
        Ok(Self {
            min,
            max,
            desired: None,
        })
    }

    /// Initial size, must lie within the bounds
    pub fn with_desired(mut self, desired: i64) -> Result<Self> {
        let desired = non_negative("desired capacity", desired)?;
        if desired < self.min || desired > self.max {
            return Err(ProvisionError::Validation(format!(
                "desired capacity {} is outside {}..={}",
                desired, self.min, self.max
            )));
        }
        self.desired = Some(desired);
        Ok(self)
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn desired(&self) -> Option<u32> {
        self.desired
    }
}

impl Default for CapacityBounds {
    fn default() -> Self {
        Self {
            min: 2,
            max: 3,
            desired: None,
        }
    }
}

fn non_negative(what: &str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        ProvisionError::Validation(format!(
            "{} must be between 0 and {}, got {}",
            what,
            u32::MAX,
            value
        ))
    })
}

/// Where the machine image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Resolved on every pass to the newest image matching the query
    Lookup(ImageQuery),
    /// Fixed image id, skips the lookup
    Pinned(String),
}

impl Default for ImageSource {
    fn default() -> Self {
        ImageSource::Lookup(ImageQuery {
            name: DEFAULT_IMAGE_NAME.to_string(),
            owners: vec![DEFAULT_IMAGE_OWNER.to_string()],
        })
    }
}

/// Root block device. Always encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootVolume {
    device_name: String,
    size_gib: u32,
    volume_type: VolumeType,
    encrypted: bool,
}

impl RootVolume {
    pub fn new(device_name: impl Into<String>, size_gib: u32, volume_type: VolumeType) -> Self {
        Self {
            device_name: device_name.into(),
            size_gib,
            volume_type,
            encrypted: true,
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn size_gib(&self) -> u32 {
        self.size_gib
    }

    pub fn volume_type(&self) -> VolumeType {
        self.volume_type
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn validate(&self) -> Result<()> {
        if self.device_name.is_empty() {
            return Err(ProvisionError::Validation(
                "root volume needs a device name".to_string(),
            ));
        }
        if self.size_gib == 0 {
            return Err(ProvisionError::Validation(
                "root volume size must be at least 1 GiB".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RootVolume {
    fn default() -> Self {
        Self::new("/dev/sda1", 10, VolumeType::Gp3)
    }
}

/// Replacement policy driven by the load balancer health signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthCheckPolicy {
    #[serde(rename = "type")]
    kind: &'static str,
    grace_period_secs: u64,
}

impl HealthCheckPolicy {
    pub fn elb(grace: Duration) -> Self {
        Self {
            kind: "ELB",
            grace_period_secs: grace.as_secs(),
        }
    }

    pub fn kind(&self) -> &str {
        self.kind
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

impl Default for HealthCheckPolicy {
    fn default() -> Self {
        Self::elb(DEFAULT_GRACE)
    }
}

/// Declarative description of one fleet, as written in fleet.kdl
#[derive(Debug, Clone)]
pub struct FleetSpec {
    /// Logical id, also the prefix of every derived resource id
    pub id: String,

    /// Network to place the fleet in. Optional when only one network exists.
    pub network: Option<String>,

    pub key_name: String,

    /// Bootstrap script, relative to the configuration file
    pub user_data: PathBuf,

    /// Interpreter directive put in front of the script
    pub shebang: String,

    pub image: ImageSource,
    pub instance_type: String,
    pub root_volume: RootVolume,
    pub subnet_group: String,
    pub capacity: CapacityBounds,
    pub health_check: HealthCheckPolicy,

    /// Attach the managed policy that allows Session Manager access
    pub ssm_session_permissions: bool,

    pub scaling_policy: String,
    pub cpu_target_percent: i64,

    /// Where the operator command writes the private key
    pub key_output_dir: String,
}

impl FleetSpec {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            key_name: format!("{}-key-pair", id.to_lowercase()),
            id,
            network: None,
            user_data: PathBuf::from(DEFAULT_USER_DATA),
            shebang: crate::provision::DEFAULT_SHEBANG.to_string(),
            image: ImageSource::default(),
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            root_volume: RootVolume::default(),
            subnet_group: DEFAULT_SUBNET_GROUP.to_string(),
            capacity: CapacityBounds::default(),
            health_check: HealthCheckPolicy::default(),
            ssm_session_permissions: true,
            scaling_policy: DEFAULT_SCALING_POLICY.to_string(),
            cpu_target_percent: DEFAULT_CPU_TARGET,
            key_output_dir: crate::provision::DEFAULT_KEY_DIR.to_string(),
        }
    }

    /// Logical id of the fleet's key pair
    pub fn key_pair_id(&self) -> String {
        format!("{}KeyPair", self.id)
    }

    /// Logical id of the fleet's scaling policy
    pub fn scaling_policy_id(&self) -> String {
        format!("{}{}", self.id, self.scaling_policy)
    }

    /// Logical ids of every resource a pass declares for this fleet
    pub fn resource_ids(&self) -> [String; 3] {
        [self.key_pair_id(), self.id.clone(), self.scaling_policy_id()]
    }

    /// Checks that need nothing beyond this fleet
    pub fn validate(&self) -> Result<()> {
        validate_logical_id("fleet id", &self.id)?;
        validate_logical_id("scaling policy name", &self.scaling_policy)?;
        if self.scaling_policy_id() == self.key_pair_id() {
            return Err(ProvisionError::DuplicateResource(format!(
                "scaling policy of fleet {} would reuse logical id {}",
                self.id,
                self.key_pair_id()
            )));
        }
        validate_key_name(&self.key_name)?;
        if self.instance_type.is_empty() {
            return Err(ProvisionError::Validation(format!(
                "fleet {} needs an instance type",
                self.id
            )));
        }
        if let ImageSource::Pinned(image_id) = &self.image
            && image_id.is_empty()
        {
            return Err(ProvisionError::Validation(format!(
                "fleet {} pins an empty image id",
                self.id
            )));
        }
        self.root_volume.validate()?;
        if self.health_check.grace().is_zero() {
            return Err(ProvisionError::Validation(format!(
                "fleet {} needs a non-zero health check grace period",
                self.id
            )));
        }
        crate::provision::validate_target_percent(self.cpu_target_percent)?;
        Ok(())
    }
}

/// Logical ids end up as template resource names, which allow only ASCII
/// letters and digits
pub fn validate_logical_id(what: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(ProvisionError::Validation(format!("{} must not be empty", what)));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ProvisionError::Validation(format!(
            "{} '{}' may only contain ASCII letters and digits",
            what, id
        )));
    }
    Ok(())
}

pub(crate) fn validate_key_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ProvisionError::Validation(
            "key pair name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_KEY_NAME_LEN {
        return Err(ProvisionError::Validation(format!(
            "key pair name is longer than {} characters",
            MAX_KEY_NAME_LEN
        )));
    }
    Ok(())
}
