//! Synthesizing provider for FleetScale
//!
//! This crate implements the CloudProvider trait without talking to any
//! cloud API. Declarations are recorded in memory and rendered as a
//! CloudFormation template, which is then deployed by CloudFormation itself.
//!
//! # Features
//!
//! - Key pairs with destroy-on-teardown deletion policy
//! - Auto scaling groups with launch templates, encrypted volumes and SSM role
//! - Target tracking scaling policies
//! - Outputs with deploy-time `${...}` substitution
//! - Machine image lookup from a local catalog snapshot
//!
//! # Example
//!
//! ```ignore
//! use fleetscale_cloud_synth::{ImageCatalog, SynthProvider};
//!
//! let catalog = ImageCatalog::load(".fleetscale/images.json").await?;
//! let provider = SynthProvider::new(Some("us-east-1".into())).with_catalog(catalog);
//!
//! // ... run a provisioning pass against `provider` ...
//!
//! let template = provider.template().await?;
//! ```

pub mod catalog;
pub mod provider;
pub mod template;

pub use catalog::{CATALOG_FILE, CatalogImage, ImageCatalog};
pub use provider::{REGION_TOKEN, SynthProvider};
