//! Partition status reports: `vparstatus` and `vparstatus -p <name> -v`.

use serde::Serialize;

use super::host::{label_value, parse_number};
use crate::Result;

/// Run-state token of a partition that is up.
pub const RUN_STATE_UP: &str = "UP";

/// Run-state token of a partition that is down.
pub const RUN_STATE_DOWN: &str = "DOWN";

/// One row of the `vparstatus` summary table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PartitionStatusLine {
    /// Partition number.
    pub num: u32,
    /// Partition name.
    pub name: String,
    /// Run-state token (`UP`, `DOWN`, ...).
    pub run_state: String,
    /// Administrative state (`Active`, ...).
    pub state: String,
}

/// Fields decoded from the detailed status of one partition.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PartitionDetail {
    /// `RunState: <token>`.
    pub run_state: Option<String>,
    /// `System assigned [Count]: <n>`.
    pub cpus: Option<u32>,
    /// `Total Memory(MB): <n>`.
    pub total_memory_mb: Option<u64>,
}

impl PartitionDetail {
    /// True when none of the fields were found, i.e. no such partition.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.run_state.is_none() && self.cpus.is_none() && self.total_memory_mb.is_none()
    }
}

/// Parse the `<num> <name> <runstate> <state>` rows of `vparstatus`.
///
/// Header, separator, and blank lines are skipped.
#[must_use]
pub fn parse_partition_table(text: &str) -> Vec<PartitionStatusLine> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let num = fields.next()?.parse().ok()?;
            let name = fields.next()?;
            let run_state = fields.next()?;
            let state = fields.next()?;
            Some(PartitionStatusLine {
                num,
                name: name.to_owned(),
                run_state: run_state.to_owned(),
                state: state.to_owned(),
            })
        })
        .collect()
}

/// Names of partitions whose run state is `UP`.
#[must_use]
pub fn running_partition_names(text: &str) -> Vec<String> {
    parse_partition_table(text)
        .into_iter()
        .filter(|line| line.run_state == RUN_STATE_UP)
        .map(|line| line.name)
        .collect()
}

/// Parse `RunState`, `System assigned [Count]` and `Total Memory(MB)`.
///
/// # Errors
///
/// Returns `AppError::RemoteCommand` if a count field is not an integer.
pub fn parse_partition_detail(text: &str) -> Result<PartitionDetail> {
    let mut detail = PartitionDetail::default();
    for line in text.lines() {
        if line.contains("RunState") {
            // 'RunState: UP'
            detail.run_state = label_value(line).map(str::to_owned);
        } else if line.contains("System assigned [Count]") {
            // 'System assigned [Count]:  5\r'
            let value = label_value(line).unwrap_or_default();
            detail.cpus = Some(parse_number(value, "System assigned [Count]")?);
        } else if line.contains("Total Memory(MB)") {
            let value = label_value(line).unwrap_or_default();
            detail.total_memory_mb = Some(parse_number(value, "Total Memory(MB)")?);
        }
    }
    Ok(detail)
}

/// Find the MAC address of the NIC attached to `network_label` in a
/// detailed status report and normalize it to `0x` + uppercase hex.
///
/// The I/O details carry one token per device, for example
/// `network:avio_lan:0,1,0x7e6b5a43e9e4:vswitch:sitelan:portid:3`; the MAC
/// is the third comma field of the third colon field.
#[must_use]
pub fn extract_management_mac(text: &str, network_label: &str) -> Option<String> {
    text.lines()
        .filter(|line| line.contains(network_label))
        .flat_map(str::split_whitespace)
        .filter(|token| token.contains(network_label))
        .find_map(mac_from_io_token)
}

fn mac_from_io_token(token: &str) -> Option<String> {
    let address = token.split(':').nth(2)?.split(',').nth(2)?;
    let hex = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))?;
    if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", hex.to_ascii_uppercase()))
}
