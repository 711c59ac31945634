//! Orchestrator-facing compute driver.
//!
//! The [`ComputeDriver`] trait is the surface the surrounding orchestrator
//! (and the CLI) calls. [`vpar_driver::VparDriver`] implements it on top of
//! the resource monitor, the placement scheduler and the provisioning
//! engine.

pub mod keyed_lock;
pub mod vpar_driver;

use crate::models::lifecycle::DestroyOutcome;
use crate::models::partition::{Partition, PartitionInfo};
use crate::models::request::SpawnRequest;
use crate::models::stats::HostStats;
use crate::remote::BoxFuture;
use crate::Result;

pub use keyed_lock::KeyedAsyncLock;
pub use vpar_driver::VparDriver;

/// Partition lifecycle and capacity operations.
pub trait ComputeDriver: Send + Sync {
    /// Names of running partitions across every known nPar, from a live
    /// scan.
    ///
    /// # Errors
    ///
    /// Returns the first remote or database failure.
    fn list_instances(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    /// Number of running partitions.
    ///
    /// # Errors
    ///
    /// Same as [`list_instances`](Self::list_instances).
    fn num_instances(&self) -> BoxFuture<'_, Result<usize>>;

    /// Live status of one partition.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the partition has no recorded
    /// placement or its node does not know it.
    fn inspect<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<PartitionInfo>>;

    /// Whether `name` is currently running somewhere.
    ///
    /// # Errors
    ///
    /// Same as [`list_instances`](Self::list_instances).
    fn exists<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool>>;

    /// Place, create and network-boot a partition.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidRequest` if the request is malformed.
    /// - `AppError::NotFound` if no nPar has room.
    /// - The failure of the first provisioning step that fails.
    fn spawn<'a>(&'a self, request: &'a SpawnRequest) -> BoxFuture<'a, Result<Partition>>;

    /// Power off and remove a partition.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first step that fails.
    fn destroy<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<DestroyOutcome>>;

    /// Fleet totals, refreshed when `refresh` is set.
    ///
    /// # Errors
    ///
    /// Propagates refresh failures.
    fn get_host_stats(&self, refresh: bool) -> BoxFuture<'_, Result<HostStats>>;

    /// Freshly computed fleet totals.
    ///
    /// # Errors
    ///
    /// Propagates refresh failures.
    fn get_available_resource(&self) -> BoxFuture<'_, Result<HostStats>>;
}
