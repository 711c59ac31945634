//! Fleet capacity refresh and cache.
//!
//! [`ResourceMonitor::update`] asks the provisioning server which nPars
//! exist, queries each one for free CPU, memory and volume group space,
//! writes changed gauges to the node table and caches the fleet totals.
//! Only one refresh runs at a time; a caller that arrives while one is in
//! flight waits for it and shares its result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::commands;
use crate::models::node::NodeResource;
use crate::models::stats::HostStats;
use crate::parse::{
    parse_cpu_memory_free, parse_volume_group, ClientKind, InventoryClient, InventoryParser,
};
use crate::persistence::node_repo::NodeResourceRepo;
use crate::remote::{RemoteCommand, RemoteExecutor};
use crate::Result;

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RefreshReport {
    /// Fleet totals.
    pub stats: HostStats,
    /// Per-node records observed this cycle, in inventory order.
    pub nodes: Vec<NodeResource>,
    /// Node rows inserted or rewritten.
    pub writes: usize,
    /// Partitions listed by the provisioning inventory.
    pub partitions_seen: usize,
}

/// Owns the cached fleet statistics.
pub struct ResourceMonitor {
    executor: Arc<dyn RemoteExecutor>,
    nodes: NodeResourceRepo,
    parser: InventoryParser,
    ignite_address: String,
    vg_name: String,
    cache: RwLock<Option<RefreshReport>>,
    refresh_guard: Mutex<()>,
    generation: AtomicU64,
}

impl ResourceMonitor {
    /// Create a monitor with an empty cache.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the inventory patterns fail to compile.
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        nodes: NodeResourceRepo,
        ignite_address: impl Into<String>,
        vg_name: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            executor,
            nodes,
            parser: InventoryParser::new()?,
            ignite_address: ignite_address.into(),
            vg_name: vg_name.into(),
            cache: RwLock::new(None),
            refresh_guard: Mutex::new(()),
            generation: AtomicU64::new(0),
        })
    }

    /// Cached fleet totals, recomputed when `refresh` is set or nothing is
    /// cached yet.
    ///
    /// # Errors
    ///
    /// Propagates any failure of [`update`](Self::update).
    pub async fn get_host_stats(&self, refresh: bool) -> Result<HostStats> {
        if !refresh {
            if let Some(report) = self.cache.read().await.as_ref() {
                return Ok(report.stats.clone());
            }
        }
        Ok(self.update().await?.stats)
    }

    /// Freshly computed fleet totals.
    ///
    /// # Errors
    ///
    /// Propagates any failure of [`update`](Self::update).
    pub async fn get_available_resource(&self) -> Result<HostStats> {
        self.get_host_stats(true).await
    }

    /// Last completed refresh, if any.
    pub async fn cached(&self) -> Option<RefreshReport> {
        self.cache.read().await.clone()
    }

    /// Run one refresh cycle.
    ///
    /// # Errors
    ///
    /// Returns the first remote, parse, or database failure. The cache is
    /// left untouched on failure.
    pub async fn update(&self) -> Result<RefreshReport> {
        let seen = self.generation.load(Ordering::Acquire);
        let _guard = self.refresh_guard.lock().await;

        if self.generation.load(Ordering::Acquire) != seen {
            if let Some(report) = self.cache.read().await.as_ref() {
                debug!("refresh completed while waiting, reusing its result");
                return Ok(report.clone());
            }
        }

        let report = self.refresh().await?;
        *self.cache.write().await = Some(report.clone());
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(report)
    }

    async fn refresh(&self) -> Result<RefreshReport> {
        debug!("updating host stats");
        let inventory = self
            .executor
            .exec(&RemoteCommand::new(
                &self.ignite_address,
                commands::client_inventory(),
            ))
            .await?;
        let clients = self.parser.parse(&inventory)?;

        let partitions_seen = clients
            .iter()
            .filter(|client| client.kind() == ClientKind::Partition)
            .count();

        let mut nodes = Vec::new();
        let mut writes = 0;
        for client in clients.iter().filter(|c| c.kind() == ClientKind::Node) {
            let node = self.observe(client).await?;
            if self.nodes.upsert_if_changed(&node).await?.wrote() {
                writes += 1;
            }
            nodes.push(node);
        }

        let stats = HostStats::aggregate(&nodes);
        info!(
            nodes = nodes.len(),
            partitions = partitions_seen,
            writes,
            vcpus = stats.vcpus,
            vcpus_used = stats.vcpus_used,
            "host stats refreshed"
        );

        Ok(RefreshReport {
            stats,
            nodes,
            writes,
            partitions_seen,
        })
    }

    async fn observe(&self, client: &InventoryClient) -> Result<NodeResource> {
        let address = client.address.as_str();
        if client.cpus.is_none() || client.memory_mb.is_none() {
            warn!(node = address, "inventory lacks cpus or memory, assuming zero");
        }

        let free_text = self
            .executor
            .exec(&RemoteCommand::new(address, commands::available_resources()))
            .await?;
        let free = parse_cpu_memory_free(&free_text)?;

        let vg_text = self
            .executor
            .exec(&RemoteCommand::new(
                address,
                commands::volume_group_report(&self.vg_name),
            ))
            .await?;
        let disk = parse_volume_group(&vg_text)?;

        Ok(NodeResource::from_observation(
            client.address.clone(),
            client.hostname.clone(),
            client.model.clone(),
            client.cpus.unwrap_or(0),
            free.cpus_free,
            client.memory_mb.unwrap_or(0),
            free.mem_free,
            disk.total_gb,
            disk.free_gb,
        ))
    }
}
