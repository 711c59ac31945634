//! Domain model module declarations.

pub mod lifecycle;
pub mod node;
pub mod partition;
pub mod placement;
pub mod request;
pub mod stats;

pub use lifecycle::{DestroyOutcome, PartitionLifecycle, ProvisioningState};
pub use node::NodeResource;
pub use partition::{NetworkIdentity, Partition, PartitionInfo, PowerState};
pub use placement::PlacementHint;
pub use request::{FixedIp, ResourceRequest, SpawnRequest};
pub use stats::HostStats;
