//! Registration of a partition with the provisioning (Ignite) server.
//!
//! Three ordered writes: a boot table entry, a per-MAC client directory
//! with an empty config, and the install directives. The first failing
//! write aborts the rest; writes already applied are left in place.

use std::sync::Arc;

use tracing::{info, warn};

use crate::commands::{self, BootEntry};
use crate::config::IgniteConfig;
use crate::remote::{RemoteCommand, RemoteExecutor};
use crate::Result;

/// Inputs for one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Partition name.
    pub name: String,
    /// Management MAC in `0x` + uppercase hex form.
    pub mac: String,
    /// Management IP.
    pub ip: String,
    /// Management gateway.
    pub gateway: String,
    /// Management netmask.
    pub netmask: String,
    /// Install configuration (image) name.
    pub image: String,
}

/// Registration step names, in execution order.
pub const REGISTRATION_STEPS: [&str; 3] = ["boot table entry", "client directory", "client config"];

/// Writes to the provisioning server.
#[derive(Clone)]
pub struct ProvisioningService {
    executor: Arc<dyn RemoteExecutor>,
    ignite: IgniteConfig,
}

impl ProvisioningService {
    /// Create a service writing through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn RemoteExecutor>, ignite: IgniteConfig) -> Self {
        Self { executor, ignite }
    }

    /// Register `registration` with the provisioning server.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first step that fails, prefixed with the
    /// step name. Later steps are not attempted.
    pub async fn register(&self, registration: &Registration) -> Result<()> {
        let entry = BootEntry {
            name: &registration.name,
            mac: &registration.mac,
            ip: &registration.ip,
            gateway: &registration.gateway,
            netmask: &registration.netmask,
        };
        let steps = [
            commands::append_boot_entry(&self.ignite, &entry),
            commands::create_client_config(&self.ignite, &registration.mac),
            commands::write_client_config(
                &self.ignite,
                &registration.mac,
                &registration.name,
                &registration.image,
            ),
        ];

        for (step, command) in REGISTRATION_STEPS.iter().zip(steps) {
            let command = RemoteCommand::new(&self.ignite.address, command);
            if let Err(err) = self.executor.exec(&command).await {
                warn!(
                    partition = %registration.name,
                    step,
                    %err,
                    "registration aborted, earlier steps are not rolled back"
                );
                return Err(err.at_step(step));
            }
        }

        info!(
            partition = %registration.name,
            mac = %registration.mac,
            "registered with provisioning server"
        );
        Ok(())
    }
}
