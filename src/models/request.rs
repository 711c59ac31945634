//! Placement and spawn requests.

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Resources requested for one workload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ResourceRequest {
    /// Orchestrator workload identifier; also names the logical volume.
    pub workload_id: String,
    /// Memory in MB.
    pub memory_mb: u64,
    /// CPUs.
    pub cpus: u32,
    /// Boot disk size in GB.
    pub disk_gb: u64,
}

/// Everything needed to create and network-boot one partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SpawnRequest {
    /// Partition name.
    pub name: String,
    /// Requested resources.
    pub resources: ResourceRequest,
    /// Provisioning-service configuration (image) name.
    pub image: String,
    /// Fixed IPs assigned by the orchestrator, one per network label.
    pub fixed_ips: Vec<FixedIp>,
    /// Management gateway.
    pub gateway: String,
    /// Management netmask.
    pub netmask: String,
}

/// One fixed IP on a labelled orchestrator network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct FixedIp {
    /// Network label.
    pub label: String,
    /// Address on that network.
    pub address: String,
}

impl SpawnRequest {
    /// IPv4 fixed IP on the network named `label`.
    #[must_use]
    pub fn management_ip(&self, label: &str) -> Option<&str> {
        self.fixed_ips
            .iter()
            .filter(|ip| ip.label == label)
            .map(|ip| ip.address.as_str())
            .find(|address| address.parse::<std::net::Ipv4Addr>().is_ok())
    }

    /// Check names and sizes before any remote work is done.
    ///
    /// Names end up inside remote shell command lines, so only
    /// `[A-Za-z0-9._-]` is accepted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidRequest` describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if !is_shell_safe(&self.name) {
            return Err(AppError::InvalidRequest(format!(
                "partition name {:?} must be non-empty and use only [A-Za-z0-9._-]",
                self.name
            )));
        }
        if !is_shell_safe(&self.resources.workload_id) {
            return Err(AppError::InvalidRequest(format!(
                "workload id {:?} must be non-empty and use only [A-Za-z0-9._-]",
                self.resources.workload_id
            )));
        }
        if self.resources.memory_mb == 0 || self.resources.cpus == 0 || self.resources.disk_gb == 0
        {
            return Err(AppError::InvalidRequest(
                "memory, cpus and disk must all be greater than zero".into(),
            ));
        }
        if self.image.trim().is_empty()
            || self
                .image
                .chars()
                .any(|c| matches!(c, '"' | '\'' | '`' | '$' | '\\') || c.is_control())
        {
            return Err(AppError::InvalidRequest(
                "image must be non-empty and free of quotes, shell expansions and control characters"
                    .into(),
            ));
        }
        for (field, value) in [("gateway", &self.gateway), ("netmask", &self.netmask)] {
            if value.parse::<std::net::Ipv4Addr>().is_err() {
                return Err(AppError::InvalidRequest(format!(
                    "{field} {value:?} is not an IPv4 address"
                )));
            }
        }
        Ok(())
    }
}

/// True for non-empty names made of `[A-Za-z0-9._-]`.
#[must_use]
pub fn is_shell_safe(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
