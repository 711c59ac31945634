//! [`ComputeDriver`] over SSH-driven vPar commands.

use std::sync::Arc;

use tracing::{info, warn};

use super::keyed_lock::KeyedAsyncLock;
use super::ComputeDriver;
use crate::commands;
use crate::config::GlobalConfig;
use crate::models::lifecycle::DestroyOutcome;
use crate::models::partition::{Partition, PartitionInfo, PowerState};
use crate::models::placement::PlacementHint;
use crate::models::request::SpawnRequest;
use crate::models::stats::HostStats;
use crate::monitor::ResourceMonitor;
use crate::parse::running_partition_names;
use crate::persistence::db::Database;
use crate::persistence::node_repo::NodeResourceRepo;
use crate::persistence::placement_repo::PlacementRepo;
use crate::provisioning::ProvisioningEngine;
use crate::remote::{BoxFuture, RemoteCommand, RemoteExecutor};
use crate::scheduler;
use crate::{AppError, Result};

/// Compute driver for a fleet of vPar-capable nPars.
pub struct VparDriver {
    executor: Arc<dyn RemoteExecutor>,
    nodes: NodeResourceRepo,
    placements: PlacementRepo,
    monitor: Arc<ResourceMonitor>,
    engine: ProvisioningEngine,
    locks: KeyedAsyncLock<String>,
    network_label: String,
}

impl VparDriver {
    /// Assemble a driver from its collaborators.
    #[must_use]
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        nodes: NodeResourceRepo,
        placements: PlacementRepo,
        monitor: Arc<ResourceMonitor>,
        engine: ProvisioningEngine,
        network_label: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            nodes,
            placements,
            monitor,
            engine,
            locks: KeyedAsyncLock::new(),
            network_label: network_label.into(),
        }
    }

    /// Wire monitor, engine and repositories from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a configured pattern does not compile.
    pub fn from_config(
        config: &GlobalConfig,
        executor: Arc<dyn RemoteExecutor>,
        db: Arc<Database>,
    ) -> Result<Self> {
        let nodes = NodeResourceRepo::new(Arc::clone(&db));
        let monitor = Arc::new(ResourceMonitor::new(
            Arc::clone(&executor),
            nodes.clone(),
            config.ignite.address.clone(),
            config.npar.vg_name.clone(),
        )?);
        let engine = ProvisioningEngine::new(
            Arc::clone(&executor),
            &config.remote,
            config.npar.clone(),
            config.ignite.clone(),
        )?;
        Ok(Self::new(
            executor,
            nodes,
            PlacementRepo::new(db),
            monitor,
            engine,
            config.npar.network_label.clone(),
        ))
    }

    /// The resource monitor shared with the refresh task.
    #[must_use]
    pub fn monitor(&self) -> &Arc<ResourceMonitor> {
        &self.monitor
    }

    async fn running_partitions(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for node in self.nodes.list_all().await? {
            let output = self
                .executor
                .exec(&RemoteCommand::new(&node.address, commands::partition_summary()))
                .await?;
            names.extend(running_partition_names(&output));
        }
        Ok(names)
    }

    async fn inspect_partition(&self, name: &str) -> Result<PartitionInfo> {
        let hint = self
            .placements
            .get_by_partition(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("partition {name} has no placement")))?;

        let detail = self.engine.resource_info(&hint.node_address, name).await?;
        if detail.is_empty() {
            return Err(AppError::NotFound(format!(
                "partition {name} not found on {}",
                hint.node_address
            )));
        }

        Ok(PartitionInfo {
            name: name.to_owned(),
            state: detail
                .run_state
                .as_deref()
                .map_or(PowerState::NoState, PowerState::from_run_state),
            cpus: detail.cpus.unwrap_or(0),
            memory_mb: detail.total_memory_mb.unwrap_or(0),
            node_address: hint.node_address,
        })
    }

    async fn spawn_partition(&self, request: &SpawnRequest) -> Result<Partition> {
        request.validate()?;
        let _guard = self.locks.lock(&request.name).await;

        let management_ip = request
            .management_ip(&self.network_label)
            .ok_or_else(|| {
                AppError::InvalidRequest(format!(
                    "no IPv4 address on network {} for {}",
                    self.network_label, request.name
                ))
            })?
            .to_owned();

        if let Some(existing) = self.placements.get_by_partition(&request.name).await? {
            return Err(AppError::InvalidRequest(format!(
                "partition {} is already placed on {} for workload {}",
                request.name, existing.node_address, existing.workload_id
            )));
        }

        let nodes = self.nodes.list_all().await?;
        let node = scheduler::select(&request.resources, &nodes).ok_or_else(|| {
            AppError::NotFound(format!(
                "no nPar can host {} (mem {} MB, cpus {}, disk {} GB)",
                request.name,
                request.resources.memory_mb,
                request.resources.cpus,
                request.resources.disk_gb
            ))
        })?;
        info!(partition = %request.name, node = %node.address, "placement chosen");

        // Recorded only once this workload's definition exists.
        let defined = self.engine.define_partition(&node.address, request).await?;
        self.placements
            .record(&PlacementHint::new(
                request.resources.workload_id.clone(),
                request.name.clone(),
                node.address.clone(),
            ))
            .await?;
        info!(
            partition = %request.name,
            volume = defined.raw_volume(),
            "placement recorded"
        );

        self.engine
            .bring_up(&node.address, request, &management_ip, defined)
            .await
    }

    async fn destroy_partition(&self, name: &str) -> Result<DestroyOutcome> {
        let _guard = self.locks.lock(&name.to_owned()).await;

        if !self.running_partitions().await?.iter().any(|n| n == name) {
            info!(partition = name, "partition not running, nothing to destroy");
            return Ok(DestroyOutcome::NotPresent);
        }

        let hint = self
            .placements
            .get_by_partition(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("partition {name} has no placement")))?;

        let outcome = self
            .engine
            .destroy(&hint.node_address, name, &hint.workload_id)
            .await?;
        match outcome {
            DestroyOutcome::Removed => {
                self.placements.remove(&hint.workload_id).await?;
            }
            DestroyOutcome::SkippedNotDown => {
                warn!(partition = name, node = %hint.node_address, "destroy skipped, partition not down");
            }
            DestroyOutcome::NotPresent => {}
        }
        Ok(outcome)
    }
}

impl ComputeDriver for VparDriver {
    fn list_instances(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(self.running_partitions())
    }

    fn num_instances(&self) -> BoxFuture<'_, Result<usize>> {
        Box::pin(async move { Ok(self.running_partitions().await?.len()) })
    }

    fn inspect<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<PartitionInfo>> {
        Box::pin(self.inspect_partition(name))
    }

    fn exists<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move { Ok(self.running_partitions().await?.iter().any(|n| n == name)) })
    }

    fn spawn<'a>(&'a self, request: &'a SpawnRequest) -> BoxFuture<'a, Result<Partition>> {
        Box::pin(self.spawn_partition(request))
    }

    fn destroy<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<DestroyOutcome>> {
        Box::pin(self.destroy_partition(name))
    }

    fn get_host_stats(&self, refresh: bool) -> BoxFuture<'_, Result<HostStats>> {
        Box::pin(self.monitor.get_host_stats(refresh))
    }

    fn get_available_resource(&self) -> BoxFuture<'_, Result<HostStats>> {
        Box::pin(self.monitor.get_available_resource())
    }
}
