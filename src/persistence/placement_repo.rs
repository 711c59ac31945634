//! Placement hint repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::Utc;

use crate::models::placement::PlacementHint;
use crate::{AppError, Result};

use super::db::Database;

/// Repository wrapper around `SQLite` for placement hints.
#[derive(Clone)]
pub struct PlacementRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct PlacementRow {
    workload_id: String,
    partition: String,
    node_address: String,
    created_at: String,
}

impl PlacementRow {
    fn into_hint(self) -> Result<PlacementHint> {
        let created_at = chrono::DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| AppError::Db(format!("invalid created_at: {e}")))?
            .with_timezone(&Utc);
        Ok(PlacementHint {
            workload_id: self.workload_id,
            partition: self.partition,
            node_address: self.node_address,
            created_at,
        })
    }
}

impl PlacementRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record (or replace) the placement of a workload.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn record(&self, hint: &PlacementHint) -> Result<()> {
        sqlx::query(
            "INSERT INTO placement_hint (workload_id, partition, node_address, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(workload_id) DO UPDATE SET
                 partition = excluded.partition,
                 node_address = excluded.node_address,
                 created_at = excluded.created_at",
        )
        .bind(&hint.workload_id)
        .bind(&hint.partition)
        .bind(&hint.node_address)
        .bind(hint.created_at.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Most recent placement of the partition named `partition`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_partition(&self, partition: &str) -> Result<Option<PlacementHint>> {
        let row: Option<PlacementRow> = sqlx::query_as(
            "SELECT workload_id, partition, node_address, created_at
             FROM placement_hint WHERE partition = ?1
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(partition)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(PlacementRow::into_hint).transpose()
    }

    /// Delete the placement of a workload. Returns whether a row existed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn remove(&self, workload_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM placement_hint WHERE workload_id = ?1")
            .bind(workload_id)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
