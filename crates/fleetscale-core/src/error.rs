use fleetscale_cloud::CloudError;
use std::path::PathBuf;
use thiserror::Error;

/// Every way a provisioning pass can fail.
///
/// Each variant aborts the pass before anything further is declared.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Cannot read {path}\nReason: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Network '{network}' has no subnets in group '{group}'")]
    Topology { network: String, group: String },

    #[error("Resource already exists: {0}")]
    DuplicateResource(String),

    #[error("Provider error: {0}")]
    Provider(CloudError),

    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<CloudError> for ProvisionError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::ResourceAlreadyExists(name) => ProvisionError::DuplicateResource(name),
            other => ProvisionError::Provider(other),
        }
    }
}

impl ProvisionError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        ProvisionError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_maps_to_duplicate() {
        let err: ProvisionError = CloudError::ResourceAlreadyExists("key pair k".into()).into();
        assert!(matches!(err, ProvisionError::DuplicateResource(name) if name == "key pair k"));
    }

    #[test]
    fn test_other_cloud_errors_stay_provider_errors() {
        let err: ProvisionError = CloudError::ImageNotFound("name=x".into()).into();
        assert!(matches!(err, ProvisionError::Provider(CloudError::ImageNotFound(_))));
    }
}
