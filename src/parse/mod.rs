//! Vendor CLI output decoding.
//!
//! Pure functions only: nothing here talks to a host, so every status
//! format can be tested against captured text.

pub mod host;
pub mod inventory;
pub mod partition;
pub mod terminal;

pub use host::{parse_cpu_memory_free, parse_volume_group, CpuMemoryFree, DiskUsage};
pub use inventory::{ClientKind, InventoryClient, InventoryParser};
pub use partition::{
    extract_management_mac, parse_partition_detail, parse_partition_table,
    running_partition_names, PartitionDetail, PartitionStatusLine,
};
pub use terminal::strip_terminal_escapes;
