//! FleetScale Cloud Abstraction
//!
//! This crate defines the narrow interface between the fleet provisioner and
//! the cloud provider that actually creates resources.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 fleetscale CLI                   │
//! │            (validate / synth / plan)             │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                fleetscale-core                   │
//! │     credential → bootstrap → fleet → policy     │
//! └─────────────────┬───────────────────────────────┘
//!                   │ ResourceConfig payloads
//! ┌─────────────────▼───────────────────────────────┐
//! │               fleetscale-cloud                   │
//! │  trait CloudProvider { ... }   Plan   State     │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │     synth     │
//!           │   provider    │
//!           └───────────────┘
//! ```

pub mod action;
pub mod error;
pub mod provider;
pub mod state;

// Re-exports
pub use action::{Action, ActionType, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use provider::{
    CloudProvider, ImageQuery, KeyPairInfo, MachineImage, RemovalPolicy, ResourceConfig,
    ResourceSet, VolumeType, resource_type,
};
pub use state::{AppliedState, RecordedResource, StateLock, StateManager};
