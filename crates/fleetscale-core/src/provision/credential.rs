//! Key pair declaration

use crate::error::Result;
use crate::model::validate_key_name;
use fleetscale_cloud::{CloudProvider, RemovalPolicy, ResourceConfig, resource_type};
use serde::Serialize;
use serde_json::json;

/// A declared key pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialHandle {
    pub logical_id: String,
    pub key_name: String,

    /// Provider-assigned id, also the parameter store path suffix
    pub key_id: String,

    pub removal_policy: RemovalPolicy,
}

/// Request payload for a key pair that is destroyed together with its fleet
pub fn key_pair_request(logical_id: &str, key_name: &str, provider: &str) -> Result<ResourceConfig> {
    validate_key_name(key_name)?;
    Ok(ResourceConfig::new(
        resource_type::KEY_PAIR,
        logical_id,
        provider,
        json!({
            "key_name": key_name,
            "removal_policy": RemovalPolicy::Destroy,
        }),
    ))
}

/// Ask the provider to generate a key pair.
///
/// The private key never passes through here; the provider writes it into
/// its parameter store.
pub async fn create_credential(
    provider: &dyn CloudProvider,
    logical_id: &str,
    key_name: &str,
) -> Result<CredentialHandle> {
    let request = key_pair_request(logical_id, key_name, provider.name())?;
    let info = provider.create_key_pair(&request).await?;
    tracing::info!("Key pair {} declared as {}", info.key_name, logical_id);

    Ok(CredentialHandle {
        logical_id: logical_id.to_string(),
        key_name: info.key_name,
        key_id: info.key_id,
        removal_policy: RemovalPolicy::Destroy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use fleetscale_cloud_synth::SynthProvider;

    #[test]
    fn test_request_carries_destroy_policy() {
        let request = key_pair_request("AsgKeyPair", "test-key-pair", "synth").unwrap();
        assert_eq!(request.key(), "key-pair:AsgKeyPair");
        assert_eq!(
            request.get_config::<RemovalPolicy>("removal_policy"),
            Some(RemovalPolicy::Destroy)
        );
    }

    #[test]
    fn test_empty_name_is_validation_error() {
        assert!(matches!(
            key_pair_request("AsgKeyPair", "", "synth"),
            Err(ProvisionError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_credential_returns_provider_id() {
        let provider = SynthProvider::new(None);
        let handle = create_credential(&provider, "AsgKeyPair", "test-key-pair")
            .await
            .unwrap();

        assert_eq!(handle.key_name, "test-key-pair");
        assert_eq!(handle.key_id, "${AsgKeyPair.KeyPairId}");
        assert_eq!(handle.removal_policy, RemovalPolicy::Destroy);
    }

    #[tokio::test]
    async fn test_name_collision_is_duplicate() {
        let provider = SynthProvider::new(None).with_existing_key_pair("test-key-pair");
        let err = create_credential(&provider, "AsgKeyPair", "test-key-pair")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::DuplicateResource(_)));
    }
}
