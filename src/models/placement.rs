//! Placement hint recorded after scheduling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a workload's partition was placed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PlacementHint {
    /// Orchestrator workload identifier.
    pub workload_id: String,
    /// Partition name.
    pub partition: String,
    /// Hosting nPar address.
    pub node_address: String,
    /// When the placement was recorded.
    pub created_at: DateTime<Utc>,
}

impl PlacementHint {
    /// Construct a hint stamped with the current time.
    #[must_use]
    pub fn new(workload_id: String, partition: String, node_address: String) -> Self {
        Self {
            workload_id,
            partition,
            node_address,
            created_at: Utc::now(),
        }
    }
}
