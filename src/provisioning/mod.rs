//! Partition provisioning.

pub mod engine;
pub mod ignite;

pub use engine::{DefinedPartition, ProvisioningEngine};
pub use ignite::{ProvisioningService, Registration};
