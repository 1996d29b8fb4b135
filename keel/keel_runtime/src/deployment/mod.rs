//! Deployments.
//!
//! The `deployment=*` resource definition with its content-backed handlers,
//! and the deployer chains extensions register into during boot.

pub mod chain;
pub mod definition;

pub use chain::{DeployerChains, DeployerRegistration, Phase};
pub use definition::deployment_definition;
