//! nPar resource repository for `SQLite` persistence.
//!
//! One row per node address. Rows are written only when a gauge changes,
//! see [`NodeResourceRepo::upsert_if_changed`].

use std::sync::Arc;

use chrono::Utc;

use crate::models::node::NodeResource;
use crate::{AppError, Result};

use super::db::Database;

/// What [`NodeResourceRepo::upsert_if_changed`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No row existed; one was inserted.
    Created,
    /// A gauge differed; the row was rewritten.
    Updated,
    /// Stored gauges already match; nothing was written.
    Unchanged,
}

impl UpsertOutcome {
    /// True when a row was written.
    #[must_use]
    pub fn wrote(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Repository wrapper around `SQLite` for node resource records.
#[derive(Clone)]
pub struct NodeResourceRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct NodeResourceRow {
    address: String,
    hostname: Option<String>,
    model: String,
    vcpus: i64,
    vcpus_used: i64,
    memory: i64,
    memory_used: i64,
    disk: i64,
    disk_used: i64,
}

impl NodeResourceRow {
    /// Convert a database row into the domain model.
    fn into_node(self) -> Result<NodeResource> {
        Ok(NodeResource {
            address: self.address,
            hostname: self.hostname,
            model: self.model,
            vcpus: from_column(self.vcpus, "vcpus")?,
            vcpus_used: from_column(self.vcpus_used, "vcpus_used")?,
            memory_mb: from_column(self.memory, "memory")?,
            memory_mb_used: from_column(self.memory_used, "memory_used")?,
            disk_gb: from_column(self.disk, "disk")?,
            disk_gb_used: from_column(self.disk_used, "disk_used")?,
        })
    }
}

fn from_column<T: TryFrom<i64>>(value: i64, column: &str) -> Result<T> {
    T::try_from(value).map_err(|_| AppError::Db(format!("{column} out of range: {value}")))
}

fn to_column<T: TryInto<i64>>(value: T, column: &str) -> Result<i64> {
    value
        .try_into()
        .map_err(|_| AppError::Db(format!("{column} does not fit in an integer column")))
}

/// Gauge columns in bind order.
struct Gauges {
    vcpus: i64,
    vcpus_used: i64,
    memory: i64,
    memory_used: i64,
    disk: i64,
    disk_used: i64,
}

impl Gauges {
    fn of(node: &NodeResource) -> Result<Self> {
        Ok(Self {
            vcpus: to_column(node.vcpus, "vcpus")?,
            vcpus_used: to_column(node.vcpus_used, "vcpus_used")?,
            memory: to_column(node.memory_mb, "memory")?,
            memory_used: to_column(node.memory_mb_used, "memory_used")?,
            disk: to_column(node.disk_gb, "disk")?,
            disk_used: to_column(node.disk_gb_used, "disk_used")?,
        })
    }
}

impl NodeResourceRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new node record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails, including when a row for
    /// the address already exists.
    pub async fn create(&self, node: &NodeResource) -> Result<()> {
        let gauges = Gauges::of(node)?;
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO npar_resource (address, hostname, model, vcpus, vcpus_used,
             memory, memory_used, disk, disk_used, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        )
        .bind(&node.address)
        .bind(&node.hostname)
        .bind(&node.model)
        .bind(gauges.vcpus)
        .bind(gauges.vcpus_used)
        .bind(gauges.memory)
        .bind(gauges.memory_used)
        .bind(gauges.disk)
        .bind(gauges.disk_used)
        .bind(&now)
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Rewrite the gauges and descriptive fields of an existing node.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no row exists for the address, or
    /// `AppError::Db` if the update fails.
    pub async fn update(&self, node: &NodeResource) -> Result<()> {
        let gauges = Gauges::of(node)?;
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE npar_resource SET hostname = ?2, model = ?3, vcpus = ?4,
             vcpus_used = ?5, memory = ?6, memory_used = ?7, disk = ?8,
             disk_used = ?9, updated_at = ?10
             WHERE address = ?1",
        )
        .bind(&node.address)
        .bind(&node.hostname)
        .bind(&node.model)
        .bind(gauges.vcpus)
        .bind(gauges.vcpus_used)
        .bind(gauges.memory)
        .bind(gauges.memory_used)
        .bind(gauges.disk)
        .bind(gauges.disk_used)
        .bind(&now)
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("node {} not found", node.address)));
        }
        Ok(())
    }

    /// Retrieve a node by address.
    ///
    /// Returns `Ok(None)` if the node does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_address(&self, address: &str) -> Result<Option<NodeResource>> {
        let row: Option<NodeResourceRow> = sqlx::query_as(
            "SELECT address, hostname, model, vcpus, vcpus_used, memory, memory_used,
             disk, disk_used FROM npar_resource WHERE address = ?1",
        )
        .bind(address)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(NodeResourceRow::into_node).transpose()
    }

    /// Every known node in registry order (insertion order).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<NodeResource>> {
        let rows: Vec<NodeResourceRow> = sqlx::query_as(
            "SELECT address, hostname, model, vcpus, vcpus_used, memory, memory_used,
             disk, disk_used FROM npar_resource ORDER BY rowid",
        )
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(NodeResourceRow::into_node).collect()
    }

    /// Insert `node` if absent, rewrite it if any gauge differs from the
    /// stored row, otherwise do nothing.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a query fails.
    pub async fn upsert_if_changed(&self, node: &NodeResource) -> Result<UpsertOutcome> {
        match self.get_by_address(&node.address).await? {
            None => {
                self.create(node).await?;
                Ok(UpsertOutcome::Created)
            }
            Some(stored) if stored.same_usage(node) => Ok(UpsertOutcome::Unchanged),
            Some(_) => {
                self.update(node).await?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }
}
