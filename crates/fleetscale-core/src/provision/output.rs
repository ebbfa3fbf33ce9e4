//! Operator-facing stack outputs

use super::credential::CredentialHandle;
use crate::error::{ProvisionError, Result};
use fleetscale_cloud::{ResourceConfig, resource_type};
use serde::Serialize;

/// Parameter store path under which generated private keys are kept
pub const PARAMETER_PREFIX: &str = "/ec2/keypair/";
pub const DEFAULT_KEY_DIR: &str = "./key-pair";
pub const OUTPUT_NAME: &str = "GetSecretKeyCommand";

/// Command that fetches the private key of `credential` into `./key-pair`
pub fn describe_credential_retrieval(credential: &CredentialHandle, region: &str) -> String {
    describe_credential_retrieval_to(credential, region, DEFAULT_KEY_DIR)
}

pub fn describe_credential_retrieval_to(
    credential: &CredentialHandle,
    region: &str,
    key_dir: &str,
) -> String {
    format!(
        "aws ssm get-parameter --name {}{} --region {} --with-decryption --query Parameter.Value --output text > {}/{}.pem",
        PARAMETER_PREFIX,
        credential.key_id,
        region,
        key_dir.trim_end_matches('/'),
        credential.key_name
    )
}

/// A named stack output. Recomputed on every pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputDescriptor {
    #[serde(skip)]
    pub logical_id: String,
    pub value: String,
    pub description: Option<String>,
}

impl OutputDescriptor {
    /// Output carrying the key retrieval command for a fleet
    pub fn credential_retrieval(
        fleet_id: &str,
        credential: &CredentialHandle,
        region: &str,
        key_dir: &str,
    ) -> Self {
        Self {
            logical_id: format!("{}{}", fleet_id, OUTPUT_NAME),
            value: describe_credential_retrieval_to(credential, region, key_dir),
            description: Some(format!(
                "Writes the private key of {} to {}",
                credential.key_name, key_dir
            )),
        }
    }

    pub fn to_resource(&self, provider: &str) -> Result<ResourceConfig> {
        let config = serde_json::to_value(self).map_err(|e| {
            ProvisionError::InvalidConfig(format!("cannot encode output {}: {}", self.logical_id, e))
        })?;
        Ok(ResourceConfig::new(
            resource_type::OUTPUT,
            &self.logical_id,
            provider,
            config,
        ))
    }
}
