//! Fleet capacity monitoring.

pub mod refresh_task;
pub mod resource_monitor;

pub use refresh_task::spawn_refresh_task;
pub use resource_monitor::{RefreshReport, ResourceMonitor};
