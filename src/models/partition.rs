//! Virtual partition (vPar) model and power-state decoding.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::parse::partition::{RUN_STATE_DOWN, RUN_STATE_UP};

/// Canonical power state of a partition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    /// Unknown or unrecognized run state.
    NoState,
    /// Partition is up.
    Running,
    /// Partition is blocked; treated as running.
    Blocked,
    /// Partition is down.
    Shutdown,
    /// Partition is powered off.
    Shutoff,
}

impl PowerState {
    /// Decode a vendor run-state token. Unrecognized tokens map to
    /// [`PowerState::NoState`].
    #[must_use]
    pub fn from_run_state(token: &str) -> Self {
        match token.trim() {
            RUN_STATE_UP => Self::Running,
            RUN_STATE_DOWN => Self::Shutdown,
            _ => Self::NoState,
        }
    }

    /// True for states that count as running.
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running | Self::Blocked)
    }

    /// True for the canonical down state that permits removal.
    #[must_use]
    pub fn is_down(self) -> bool {
        self == Self::Shutdown
    }
}

impl Display for PowerState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoState => "nostate",
            Self::Running => "running",
            Self::Blocked => "blocked",
            Self::Shutdown => "shutdown",
            Self::Shutoff => "shutoff",
        };
        f.write_str(name)
    }
}

/// Management network identity of a partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct NetworkIdentity {
    /// Management NIC MAC in `0x` + uppercase hex form.
    pub mac: Option<String>,
    /// Management IPv4 address.
    pub ip: String,
    /// Management gateway.
    pub gateway: String,
    /// Management netmask.
    pub netmask: String,
}

/// A partition being provisioned or managed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Partition {
    /// Partition name; unique per node.
    pub name: String,
    /// Address of the hosting nPar.
    pub node_address: String,
    /// Memory allocation in MB.
    pub memory_mb: u64,
    /// CPU allocation.
    pub cpus: u32,
    /// Last observed power state.
    pub power_state: PowerState,
    /// Management network identity.
    pub network: NetworkIdentity,
    /// Raw logical volume backing the boot disk.
    pub volume_path: Option<String>,
}

/// Live status of one partition as reported by its node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PartitionInfo {
    /// Partition name.
    pub name: String,
    /// Hosting nPar address.
    pub node_address: String,
    /// Decoded power state.
    pub state: PowerState,
    /// Assigned CPUs.
    pub cpus: u32,
    /// Total memory in MB.
    pub memory_mb: u64,
}
