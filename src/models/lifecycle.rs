//! Partition provisioning lifecycle.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Step reached by a partition in its provisioning lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningState {
    /// Nothing exists yet.
    Undefined,
    /// Logical volume created.
    StorageAllocated,
    /// Partition definition created.
    Defined,
    /// Partition started to its firmware shell.
    BootedToFirmware,
    /// Boot entry and client config written on the provisioning server.
    NetworkRegistered,
    /// Network boot issued.
    Running,
    /// Forced power off issued.
    PoweringOff,
    /// Observed down after power off.
    Stopped,
    /// Definition and volume removed.
    Removed,
}

impl ProvisioningState {
    /// Determine whether a lifecycle transition is permitted.
    ///
    /// A powered-off partition that is not observed down goes back to
    /// `Running` only through a fresh boot; removal requires `Stopped`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Undefined, Self::StorageAllocated)
                | (Self::StorageAllocated, Self::Defined)
                | (Self::Defined, Self::BootedToFirmware)
                | (Self::BootedToFirmware, Self::NetworkRegistered)
                | (Self::NetworkRegistered, Self::Running)
                | (
                    Self::Undefined
                        | Self::Defined
                        | Self::BootedToFirmware
                        | Self::NetworkRegistered
                        | Self::Running
                        | Self::Stopped,
                    Self::PoweringOff
                )
                | (Self::PoweringOff, Self::Stopped)
                | (Self::Stopped, Self::Removed | Self::BootedToFirmware)
        )
    }
}

impl Display for ProvisioningState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Undefined => "undefined",
            Self::StorageAllocated => "storage_allocated",
            Self::Defined => "defined",
            Self::BootedToFirmware => "booted_to_firmware",
            Self::NetworkRegistered => "network_registered",
            Self::Running => "running",
            Self::PoweringOff => "powering_off",
            Self::Stopped => "stopped",
            Self::Removed => "removed",
        };
        f.write_str(name)
    }
}

/// Tracks one partition through [`ProvisioningState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionLifecycle {
    name: String,
    state: ProvisioningState,
}

impl PartitionLifecycle {
    /// Start tracking `name` in [`ProvisioningState::Undefined`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::resume(name, ProvisioningState::Undefined)
    }

    /// Track a partition already known to be in `state`.
    #[must_use]
    pub fn resume(name: impl Into<String>, state: ProvisioningState) -> Self {
        Self {
            name: name.into(),
            state,
        }
    }

    /// Partition name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if the edge is not legal.
    pub fn advance(&mut self, next: ProvisioningState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::Protocol(format!(
                "partition {} cannot move from {} to {next}",
                self.name, self.state
            )));
        }
        self.state = next;
        Ok(())
    }
}

/// Result of a destroy request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DestroyOutcome {
    /// Definition and volume removed.
    Removed,
    /// Partition was powered off but not observed down; nothing removed.
    SkippedNotDown,
    /// Partition is not running on any node; nothing to do.
    NotPresent,
}
