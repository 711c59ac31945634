//! Physical partition (nPar) capacity model.

use serde::{Deserialize, Serialize};

/// Capacity and usage of one nPar, keyed by address.
///
/// Used amounts are derived as `total - free` with saturating arithmetic,
/// so `used <= total` holds on every dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct NodeResource {
    /// Management address; unique key.
    pub address: String,
    /// Hostname reported by the provisioning inventory.
    pub hostname: Option<String>,
    /// Hardware model string.
    pub model: String,
    /// Total CPUs.
    pub vcpus: u32,
    /// CPUs assigned to partitions.
    pub vcpus_used: u32,
    /// Total memory in MB.
    pub memory_mb: u64,
    /// Memory assigned to partitions in MB.
    pub memory_mb_used: u64,
    /// Volume group size in GB.
    pub disk_gb: u64,
    /// Allocated volume group space in GB.
    pub disk_gb_used: u64,
}

impl NodeResource {
    /// Build a record from totals and observed free amounts.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_observation(
        address: String,
        hostname: Option<String>,
        model: String,
        vcpus: u32,
        vcpus_free: u32,
        memory_mb: u64,
        memory_mb_free: u64,
        disk_gb: u64,
        disk_gb_free: u64,
    ) -> Self {
        Self {
            address,
            hostname,
            model,
            vcpus,
            vcpus_used: vcpus.saturating_sub(vcpus_free),
            memory_mb,
            memory_mb_used: memory_mb.saturating_sub(memory_mb_free),
            disk_gb,
            disk_gb_used: disk_gb.saturating_sub(disk_gb_free),
        }
    }

    /// Unassigned CPUs.
    #[must_use]
    pub fn free_vcpus(&self) -> u32 {
        self.vcpus.saturating_sub(self.vcpus_used)
    }

    /// Unassigned memory in MB.
    #[must_use]
    pub fn free_memory_mb(&self) -> u64 {
        self.memory_mb.saturating_sub(self.memory_mb_used)
    }

    /// Unallocated disk in GB.
    #[must_use]
    pub fn free_disk_gb(&self) -> u64 {
        self.disk_gb.saturating_sub(self.disk_gb_used)
    }

    /// True when the persisted gauges (totals and used) are identical.
    ///
    /// Descriptive fields are ignored.
    #[must_use]
    pub fn same_usage(&self, other: &Self) -> bool {
        self.vcpus == other.vcpus
            && self.vcpus_used == other.vcpus_used
            && self.memory_mb == other.memory_mb
            && self.memory_mb_used == other.memory_mb_used
            && self.disk_gb == other.disk_gb
            && self.disk_gb_used == other.disk_gb_used
    }
}
