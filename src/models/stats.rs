//! Fleet-wide host statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::node::NodeResource;

/// Hypervisor type reported to the orchestrator.
pub const HYPERVISOR_TYPE: &str = "hpux";

/// Hypervisor version reported to the orchestrator.
pub const HYPERVISOR_VERSION: &str = "20140918";

/// Hostname reported for the aggregated fleet.
pub const HYPERVISOR_HOSTNAME: &str = "hpux";

/// Aggregated capacity of every known nPar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HostStats {
    /// Total CPUs.
    pub vcpus: u64,
    /// CPUs assigned to partitions.
    pub vcpus_used: u64,
    /// Total memory in MB.
    pub memory_mb: u64,
    /// Assigned memory in MB.
    pub memory_mb_used: u64,
    /// Total disk in GB.
    pub local_gb: u64,
    /// Allocated disk in GB.
    pub local_gb_used: u64,
    /// Always [`HYPERVISOR_TYPE`].
    pub hypervisor_type: String,
    /// Always [`HYPERVISOR_VERSION`].
    pub hypervisor_version: String,
    /// Always [`HYPERVISOR_HOSTNAME`].
    pub hypervisor_hostname: String,
    /// CPU description; an empty JSON object.
    pub cpu_info: String,
    /// Number of nPars aggregated.
    pub node_count: usize,
    /// When the aggregate was computed.
    pub refreshed_at: DateTime<Utc>,
}

impl HostStats {
    /// Sum `nodes` into fleet totals.
    #[must_use]
    pub fn aggregate(nodes: &[NodeResource]) -> Self {
        let mut stats = Self {
            vcpus: 0,
            vcpus_used: 0,
            memory_mb: 0,
            memory_mb_used: 0,
            local_gb: 0,
            local_gb_used: 0,
            hypervisor_type: HYPERVISOR_TYPE.into(),
            hypervisor_version: HYPERVISOR_VERSION.into(),
            hypervisor_hostname: HYPERVISOR_HOSTNAME.into(),
            cpu_info: "{}".into(),
            node_count: nodes.len(),
            refreshed_at: Utc::now(),
        };
        for node in nodes {
            stats.vcpus += u64::from(node.vcpus);
            stats.vcpus_used += u64::from(node.vcpus_used);
            stats.memory_mb += node.memory_mb;
            stats.memory_mb_used += node.memory_mb_used;
            stats.local_gb += node.disk_gb;
            stats.local_gb_used += node.disk_gb_used;
        }
        stats
    }
}
