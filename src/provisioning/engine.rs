//! Partition lifecycle operations on one nPar.
//!
//! Every operation is a single vendor CLI command (or, for network boot,
//! a console conversation) with its acknowledgement checked in the
//! output. [`ProvisioningEngine::provision`] chains them in lifecycle
//! order and stops at the first failure, leaving completed steps in place.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info, warn};

use super::ignite::{ProvisioningService, Registration};
use crate::commands;
use crate::config::{IgniteConfig, NparConfig, RemoteConfig};
use crate::models::lifecycle::{DestroyOutcome, PartitionLifecycle, ProvisioningState};
use crate::models::partition::{NetworkIdentity, Partition, PowerState};
use crate::models::request::SpawnRequest;
use crate::parse::{extract_management_mac, parse_partition_detail, PartitionDetail};
use crate::remote::console::{self, ConsoleState, ConsoleTimeouts, NetworkBootPlan};
use crate::remote::{RemoteCommand, RemoteExecutor};
use crate::{AppError, Result};

/// A partition whose boot volume and definition exist on its node.
///
/// Only [`ProvisioningEngine::define_partition`] creates one.
#[derive(Debug)]
pub struct DefinedPartition {
    lifecycle: PartitionLifecycle,
    raw_volume: String,
}

impl DefinedPartition {
    /// Raw device path of the boot volume.
    #[must_use]
    pub fn raw_volume(&self) -> &str {
        &self.raw_volume
    }
}

/// Drives vendor CLI lifecycle commands.
pub struct ProvisioningEngine {
    executor: Arc<dyn RemoteExecutor>,
    provisioning: ProvisioningService,
    npar: NparConfig,
    ignite: IgniteConfig,
    prompt: Regex,
    timeouts: ConsoleTimeouts,
}

impl ProvisioningEngine {
    /// Build an engine from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the prompt pattern does not compile.
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        remote: &RemoteConfig,
        npar: NparConfig,
        ignite: IgniteConfig,
    ) -> Result<Self> {
        let prompt = Regex::new(&remote.prompt_pattern)
            .map_err(|err| AppError::Config(format!("remote.prompt_pattern invalid: {err}")))?;
        Ok(Self {
            provisioning: ProvisioningService::new(Arc::clone(&executor), ignite.clone()),
            executor,
            npar,
            ignite,
            prompt,
            timeouts: ConsoleTimeouts {
                step: remote.ssh_timeout(),
                boot: remote.lanboot_timeout(),
            },
        })
    }

    async fn run(&self, node: &str, command: String) -> Result<String> {
        debug!(node, "running vendor command");
        self.executor.exec(&RemoteCommand::new(node, command)).await
    }

    /// Create the partition's boot volume; returns its raw device path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RemoteCommand` if `lvcreate` does not report the
    /// raw device path.
    pub async fn allocate_storage(&self, node: &str, workload_id: &str, disk_gb: u64) -> Result<String> {
        let output = self
            .run(node, commands::create_volume(&self.npar.vg_name, workload_id, disk_gb))
            .await?;
        let raw = commands::raw_volume_path(&self.npar.vg_name, workload_id);
        if !output.contains(&raw) {
            return Err(AppError::RemoteCommand(format!(
                "lvcreate did not report {raw}: {}",
                output.trim()
            )));
        }
        Ok(raw)
    }

    /// Define the partition with its disk and management/production NICs.
    ///
    /// # Errors
    ///
    /// Remote failures surface unchanged; defining an existing name fails.
    pub async fn define(
        &self,
        node: &str,
        name: &str,
        memory_mb: u64,
        cpus: u32,
        raw_volume: &str,
    ) -> Result<()> {
        let output = self
            .run(
                node,
                commands::create_partition(&self.npar, name, memory_mb, cpus, raw_volume),
            )
            .await?;
        debug!(node, partition = name, output = %output.trim(), "vparcreate finished");
        Ok(())
    }

    /// Start the partition to its firmware shell. Returns whether the boot
    /// acknowledgement was printed.
    ///
    /// # Errors
    ///
    /// Only transport failures are errors.
    pub async fn boot_to_firmware(&self, node: &str, name: &str) -> Result<bool> {
        let output = self.run(node, commands::boot_partition(name)).await?;
        Ok(output.contains(commands::BOOT_ACKNOWLEDGEMENT))
    }

    /// Start the partition without checking the acknowledgement.
    ///
    /// # Errors
    ///
    /// Only transport failures are errors.
    pub async fn power_on(&self, node: &str, name: &str) -> Result<()> {
        self.run(node, commands::boot_partition(name)).await?;
        Ok(())
    }

    /// MAC of the NIC on the management vswitch, if the partition has one.
    ///
    /// # Errors
    ///
    /// Only transport failures are errors.
    pub async fn read_management_mac(&self, node: &str, name: &str) -> Result<Option<String>> {
        let output = self.run(node, commands::partition_detail(name)).await?;
        Ok(extract_management_mac(&output, &self.npar.management_network))
    }

    /// Run state, CPU count and memory of one partition.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RemoteCommand` if a count is not numeric.
    pub async fn resource_info(&self, node: &str, name: &str) -> Result<PartitionDetail> {
        let output = self.run(node, commands::partition_detail(name)).await?;
        parse_partition_detail(&output)
    }

    /// Forced power off followed by the fixed grace period. The final state
    /// is not checked.
    ///
    /// # Errors
    ///
    /// Only transport failures are errors.
    pub async fn power_off(&self, node: &str, name: &str) -> Result<()> {
        self.run(node, commands::reset_partition(name)).await?;
        tokio::time::sleep(self.npar.power_off_grace()).await;
        Ok(())
    }

    /// Power the partition off and attach an NPIV virtual HBA.
    ///
    /// # Errors
    ///
    /// Remote failures surface unchanged.
    pub async fn attach_vhba(&self, node: &str, name: &str, wwpn: &str, wwnn: &str) -> Result<()> {
        self.power_off(node, name).await?;
        let output = self.run(node, commands::attach_vhba(name, wwpn, wwnn)).await?;
        info!(node, partition = name, output = %output.trim(), "vHBA attached");
        Ok(())
    }

    /// Drive the firmware console through network boot.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Timeout`, `AppError::Protocol` or
    /// `AppError::Connectivity` from the console conversation.
    pub async fn network_boot(&self, node: &str, plan: &NetworkBootPlan) -> Result<ConsoleState> {
        console::network_boot(
            self.executor.as_ref(),
            node,
            plan,
            self.prompt.clone(),
            self.timeouts,
        )
        .await
    }

    /// Register the partition with the provisioning server.
    ///
    /// # Errors
    ///
    /// See [`ProvisioningService::register`].
    pub async fn register(&self, registration: &Registration) -> Result<()> {
        self.provisioning.register(registration).await
    }

    /// Power off, then remove the definition and volume only if the
    /// partition is observed down.
    ///
    /// # Errors
    ///
    /// Remote failures of any step, prefixed with the step name.
    pub async fn destroy(&self, node: &str, name: &str, workload_id: &str) -> Result<DestroyOutcome> {
        let mut lifecycle = PartitionLifecycle::resume(name, ProvisioningState::Running);

        lifecycle.advance(ProvisioningState::PoweringOff)?;
        self.power_off(node, name)
            .await
            .map_err(|err| step_failed(&lifecycle, node, "power off", err))?;

        let detail = self
            .resource_info(node, name)
            .await
            .map_err(|err| step_failed(&lifecycle, node, "read run state", err))?;
        let state = detail
            .run_state
            .as_deref()
            .map_or(PowerState::NoState, PowerState::from_run_state);
        if !state.is_down() {
            warn!(node, partition = name, %state, "partition not down after power off, skipping removal");
            return Ok(DestroyOutcome::SkippedNotDown);
        }
        lifecycle.advance(ProvisioningState::Stopped)?;

        self.run(node, commands::remove_partition(name))
            .await
            .map_err(|err| step_failed(&lifecycle, node, "remove definition", err))?;
        self.run(node, commands::remove_volume(&self.npar.vg_name, workload_id))
            .await
            .map_err(|err| step_failed(&lifecycle, node, "remove volume", err))?;
        lifecycle.advance(ProvisioningState::Removed)?;

        info!(node, partition = name, "partition removed");
        Ok(DestroyOutcome::Removed)
    }

    /// Full spawn sequence on `node`: storage, definition, firmware boot,
    /// MAC lookup, registration, network boot.
    ///
    /// # Errors
    ///
    /// See [`define_partition`](Self::define_partition) and
    /// [`bring_up`](Self::bring_up).
    pub async fn provision(
        &self,
        node: &str,
        request: &SpawnRequest,
        management_ip: &str,
    ) -> Result<Partition> {
        let defined = self.define_partition(node, request).await?;
        self.bring_up(node, request, management_ip, defined).await
    }

    /// Allocate the boot volume and define the partition.
    ///
    /// # Errors
    ///
    /// The failing step's error, prefixed with its name.
    pub async fn define_partition(
        &self,
        node: &str,
        request: &SpawnRequest,
    ) -> Result<DefinedPartition> {
        let name = request.name.as_str();
        let resources = &request.resources;
        let mut lifecycle = PartitionLifecycle::new(name);

        let raw_volume = self
            .allocate_storage(node, &resources.workload_id, resources.disk_gb)
            .await
            .map_err(|err| step_failed(&lifecycle, node, "allocate storage", err))?;
        lifecycle.advance(ProvisioningState::StorageAllocated)?;

        self.define(node, name, resources.memory_mb, resources.cpus, &raw_volume)
            .await
            .map_err(|err| step_failed(&lifecycle, node, "define", err))?;
        lifecycle.advance(ProvisioningState::Defined)?;

        Ok(DefinedPartition {
            lifecycle,
            raw_volume,
        })
    }

    /// Take a defined partition through firmware boot, registration and
    /// network boot.
    ///
    /// # Errors
    ///
    /// The first failing step, prefixed with its name. A boot without
    /// acknowledgement or a missing management MAC is
    /// `AppError::RemoteCommand`.
    pub async fn bring_up(
        &self,
        node: &str,
        request: &SpawnRequest,
        management_ip: &str,
        defined: DefinedPartition,
    ) -> Result<Partition> {
        let name = request.name.as_str();
        let DefinedPartition {
            mut lifecycle,
            raw_volume,
        } = defined;

        let acknowledged = self
            .boot_to_firmware(node, name)
            .await
            .map_err(|err| step_failed(&lifecycle, node, "boot to firmware", err))?;
        if !acknowledged {
            let err = AppError::RemoteCommand(format!(
                "vparboot did not acknowledge start of {name}"
            ));
            return Err(step_failed(&lifecycle, node, "boot to firmware", err));
        }
        lifecycle.advance(ProvisioningState::BootedToFirmware)?;

        let mac = match self.read_management_mac(node, name).await {
            Ok(Some(mac)) => mac,
            Ok(None) => {
                let err = AppError::RemoteCommand(format!(
                    "no NIC on {} found for {name}",
                    self.npar.management_network
                ));
                return Err(step_failed(&lifecycle, node, "read management mac", err));
            }
            Err(err) => return Err(step_failed(&lifecycle, node, "read management mac", err)),
        };

        let registration = Registration {
            name: name.to_owned(),
            mac: mac.clone(),
            ip: management_ip.to_owned(),
            gateway: request.gateway.clone(),
            netmask: request.netmask.clone(),
            image: request.image.clone(),
        };
        self.register(&registration)
            .await
            .map_err(|err| step_failed(&lifecycle, node, "register", err))?;
        lifecycle.advance(ProvisioningState::NetworkRegistered)?;

        let plan = NetworkBootPlan {
            partition: name.to_owned(),
            server_address: self.ignite.address.clone(),
            client_address: management_ip.to_owned(),
            gateway: request.gateway.clone(),
            netmask: request.netmask.clone(),
            boot_file: self.ignite.boot_file.clone(),
            profile: self.ignite.profile_name.clone(),
        };
        self.network_boot(node, &plan)
            .await
            .map_err(|err| step_failed(&lifecycle, node, "network boot", err))?;
        lifecycle.advance(ProvisioningState::Running)?;

        info!(node, partition = name, mac = %mac, "partition provisioned");
        Ok(Partition {
            name: name.to_owned(),
            node_address: node.to_owned(),
            memory_mb: request.resources.memory_mb,
            cpus: request.resources.cpus,
            power_state: PowerState::Running,
            network: NetworkIdentity {
                mac: Some(mac),
                ip: management_ip.to_owned(),
                gateway: request.gateway.clone(),
                netmask: request.netmask.clone(),
            },
            volume_path: Some(raw_volume),
        })
    }
}

/// Log a failed step with the state reached and tag the error.
fn step_failed(lifecycle: &PartitionLifecycle, node: &str, step: &str, err: AppError) -> AppError {
    warn!(
        node,
        partition = lifecycle.name(),
        step,
        state = %lifecycle.state(),
        %err,
        "provisioning step failed"
    );
    err.at_step(step)
}
