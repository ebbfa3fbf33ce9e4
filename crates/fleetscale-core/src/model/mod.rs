//! Configuration model
//!
//! What fleet.kdl declares: networks, fleets and project settings.

mod fleet;
mod network;
mod project;

// Re-exports
pub use fleet::*;
pub use network::*;
pub use project::*;
