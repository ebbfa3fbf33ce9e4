//! FleetScale core
//!
//! Parses fleet.kdl and runs the provisioning pass: key pair, bootstrap
//! payload, scalable fleet, scaling policy and key retrieval output.

pub mod error;
pub mod model;
pub mod parser;
pub mod provision;

pub use error::*;
pub use model::*;
pub use parser::*;
pub use provision::*;
